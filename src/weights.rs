use crate::errors::{AppError, AppResult};
use crate::models::SubcategoryInput;
use once_cell::sync::Lazy;

static HEX_COLOR_RE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid hex color regex"));

const MAX_NAME_CHARS: usize = 50;
const MAX_EMOJI_CHARS: usize = 10;
const WEIGHT_UNITS: f64 = 1000.0;

pub fn is_hex_color(raw: &str) -> bool {
    HEX_COLOR_RE.is_match(raw)
}

/// Rescales weights so they sum to exactly 1.000 in three-decimal steps.
/// Rounding residue goes to the largest remainders, so a heavier input never
/// ends up lighter than a smaller one.
pub fn normalize_weights(weights: &[f64]) -> AppResult<Vec<f64>> {
    if weights.iter().any(|weight| !weight.is_finite() || *weight <= 0.0) {
        return Err(AppError::InvalidWeights(
            "every weight must be a positive number".to_string(),
        ));
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(AppError::InvalidWeights(
            "weights must sum to a positive value".to_string(),
        ));
    }

    let exact = weights
        .iter()
        .map(|weight| weight / total * WEIGHT_UNITS)
        .collect::<Vec<_>>();
    let mut units = exact.iter().map(|value| value.floor()).collect::<Vec<_>>();
    let assigned: f64 = units.iter().sum();
    let residue = (WEIGHT_UNITS - assigned).round().max(0.0) as usize;

    let mut by_remainder = (0..exact.len()).collect::<Vec<_>>();
    by_remainder.sort_by(|a, b| {
        let (rem_a, rem_b) = (exact[*a] - units[*a], exact[*b] - units[*b]);
        rem_b.total_cmp(&rem_a).then(weights[*b].total_cmp(&weights[*a]))
    });
    for index in by_remainder.into_iter().take(residue) {
        units[index] += 1.0;
    }

    Ok(units.into_iter().map(|unit| unit / WEIGHT_UNITS).collect())
}

pub fn validate_subcategory_inputs(inputs: &[SubcategoryInput]) -> AppResult<()> {
    for input in inputs {
        let name_len = input.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_CHARS {
            return Err(AppError::Validation(format!(
                "subcategory name must be 1-{MAX_NAME_CHARS} characters"
            )));
        }
        if input.emoji.chars().count() > MAX_EMOJI_CHARS {
            return Err(AppError::Validation(format!(
                "emoji for '{}' exceeds {MAX_EMOJI_CHARS} characters",
                input.name
            )));
        }
        if !is_hex_color(&input.color) {
            return Err(AppError::Validation(format!(
                "color for '{}' must look like #a1b2c3",
                input.name
            )));
        }
    }
    Ok(())
}

/// Validates a full replacement set and returns it with normalized weights.
pub fn normalize_subcategory_set(inputs: &[SubcategoryInput]) -> AppResult<Vec<SubcategoryInput>> {
    validate_subcategory_inputs(inputs)?;
    let weights = inputs.iter().map(|input| input.weight).collect::<Vec<_>>();
    let normalized = normalize_weights(&weights)?;
    Ok(inputs
        .iter()
        .zip(normalized)
        .map(|(input, weight)| SubcategoryInput {
            name: input.name.trim().to_string(),
            weight,
            ..input.clone()
        })
        .collect())
}
