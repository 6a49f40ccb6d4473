//! Built-in sample catalog

use crate::models::{Catalog, Recipe};

/// A small control-circuit tree with a shared intermediate (infused alloy)
pub fn sample_catalog() -> Catalog {
    [
        (
            "eliteControlCircuit",
            Recipe::new(1)
                .with_input("reinforcedAlloy", 2)
                .with_input("advancedControlCircuit", 1),
        ),
        (
            "advancedControlCircuit",
            Recipe::new(1)
                .with_input("infusedAlloy", 2)
                .with_input("basicControlCircuit", 1),
        ),
        ("basicControlCircuit", Recipe::new(1).with_input("osmium", 1)),
        ("reinforcedAlloy", Recipe::new(1).with_input("infusedAlloy", 1)),
        ("infusedAlloy", Recipe::new(1).with_input("iron", 1)),
    ]
    .into_iter()
    .map(|(name, recipe)| (name.to_string(), recipe))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::plan;
    use crate::models::StepItem;

    #[test]
    fn sample_is_valid() {
        assert!(sample_catalog().validate().is_ok());
    }

    #[test]
    fn sample_plan_totals() {
        let catalog = sample_catalog();
        let plan = plan(&catalog, "eliteControlCircuit", 1).unwrap();

        // 2 reinforced alloy (1 infused each) + 2 infused for the advanced circuit
        assert_eq!(plan.totals.crafted_units("infusedAlloy"), Some(4));
        assert_eq!(plan.totals.raw_amount("iron"), Some(4));
        assert_eq!(plan.totals.raw_amount("osmium"), Some(1));

        assert_eq!(
            plan.steps,
            vec![
                vec![StepItem::new("basicControlCircuit", 1), StepItem::new("infusedAlloy", 4)],
                vec![
                    StepItem::new("advancedControlCircuit", 1),
                    StepItem::new("reinforcedAlloy", 2),
                ],
                vec![StepItem::new("eliteControlCircuit", 1)],
            ]
        );
    }
}
