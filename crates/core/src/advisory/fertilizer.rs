use crate::domain::recommendation::{FertilizerGap, ProductEstimate};

/// Target nutrient levels (kg/ha) for one crop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NutrientTarget {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
}

pub const GENERIC_TARGET: NutrientTarget =
    NutrientTarget { nitrogen: 100.0, phosphorus: 50.0, potassium: 50.0 };

const CROP_TARGETS: &[(&str, NutrientTarget)] = &[
    ("wheat", NutrientTarget { nitrogen: 120.0, phosphorus: 60.0, potassium: 60.0 }),
    ("rice", NutrientTarget { nitrogen: 100.0, phosphorus: 50.0, potassium: 50.0 }),
    ("maize", NutrientTarget { nitrogen: 150.0, phosphorus: 75.0, potassium: 75.0 }),
    ("cotton", NutrientTarget { nitrogen: 80.0, phosphorus: 40.0, potassium: 40.0 }),
    ("bajra", NutrientTarget { nitrogen: 60.0, phosphorus: 30.0, potassium: 30.0 }),
    ("mustard", NutrientTarget { nitrogen: 80.0, phosphorus: 40.0, potassium: 40.0 }),
    ("gram", NutrientTarget { nitrogen: 20.0, phosphorus: 60.0, potassium: 20.0 }),
];

// Alternate names the engine or callers use for table crops.
const CROP_ALIASES: &[(&str, &str)] =
    &[("pearl millet", "bajra"), ("pearl millet (bajra)", "bajra"), ("chickpea", "gram")];

// Nutrient content of each commercial product, in percent.
const UREA_N_PERCENT: f64 = 46.0;
const DAP_P_PERCENT: f64 = 18.0;
const MOP_K_PERCENT: f64 = 60.0;

pub fn target_for(crop: &str) -> NutrientTarget {
    let key = crop.trim().to_lowercase();
    let key = CROP_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(key);

    CROP_TARGETS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, target)| *target)
        .unwrap_or(GENERIC_TARGET)
}

/// Shortfall between the crop's target and the supplied soil levels. Oversupply is
/// clamped to zero; non-finite readings yield an all-zero result.
pub fn fertilizer_gap(
    nitrogen: f64,
    phosphorus: f64,
    potassium: f64,
    crop: &str,
) -> FertilizerGap {
    if ![nitrogen, phosphorus, potassium].iter().all(|value| value.is_finite()) {
        return FertilizerGap::default();
    }

    let target = target_for(crop);
    let nitrogen_gap = (target.nitrogen - nitrogen).max(0.0);
    let phosphorus_gap = (target.phosphorus - phosphorus).max(0.0);
    let potassium_gap = (target.potassium - potassium).max(0.0);

    FertilizerGap {
        nitrogen_gap,
        phosphorus_gap,
        potassium_gap,
        total_fertilizer: nitrogen_gap + phosphorus_gap + potassium_gap,
        recommendations: ProductEstimate {
            urea: product_quantity(nitrogen_gap, UREA_N_PERCENT),
            dap: product_quantity(phosphorus_gap, DAP_P_PERCENT),
            mop: product_quantity(potassium_gap, MOP_K_PERCENT),
        },
    }
}

fn product_quantity(gap: f64, percent: f64) -> f64 {
    if gap <= 0.0 {
        return 0.0;
    }
    round_one_decimal(gap / percent * 100.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
