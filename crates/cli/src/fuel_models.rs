//! FBP fuel-type coefficient table: maps the descriptive `fuel_type` column
//! of a fuel lookup table (spec §6) onto the closed-form parameters
//! `firegrowth_core::StandardFuel` needs. Values are the published FBP
//! system defaults for the standard Canadian fuel types.

use firegrowth_core::StandardFuel;

use crate::error::{CliError, CliResult};

#[must_use]
fn coefficients(fuel_type: &str, fuel_code: u16) -> Option<StandardFuel> {
    let f = |a: f64, b: f64, c: f64, bui_q: f64, fuel_load: f64, cbh: f64, cfl: f64, can_crown: bool, moe: f64| {
        StandardFuel {
            fuel_code,
            a,
            b,
            c,
            bui_q,
            bui_0: 50.0,
            fuel_load,
            cbh,
            cfl,
            can_crown,
            moisture_of_extinction: moe,
        }
    };
    Some(match fuel_type.to_ascii_uppercase().as_str() {
        "C1" => f(90.0, 0.0649, 4.5, 0.9, 1.5, 2.0, 0.75, true, 0.12),
        "C2" => f(110.0, 0.0282, 1.5, 0.7, 5.0, 3.0, 0.80, true, 0.15),
        "C3" => f(110.0, 0.0444, 3.0, 0.75, 10.0, 8.0, 1.15, true, 0.15),
        "C4" => f(110.0, 0.0293, 1.5, 0.8, 12.0, 4.0, 1.20, true, 0.15),
        "C5" => f(30.0, 0.0697, 4.0, 0.8, 11.0, 18.0, 1.25, true, 0.15),
        "C6" => f(30.0, 0.0800, 3.0, 0.8, 12.0, 7.0, 1.00, true, 0.15),
        "C7" => f(45.0, 0.0305, 2.0, 0.85, 6.0, 10.0, 0.50, true, 0.15),
        "D1" => f(30.0, 0.0232, 1.6, 0.90, 8.0, 0.0, 0.0, false, 0.25),
        "D2" => f(6.0, 0.0232, 1.6, 0.90, 8.0, 0.0, 0.0, false, 0.25),
        "M1" => f(70.0, 0.0282, 1.5, 0.75, 6.0, 6.0, 0.80, true, 0.20),
        "M2" => f(70.0, 0.0282, 1.5, 0.75, 6.0, 6.0, 0.80, true, 0.25),
        "M3" => f(80.0, 0.0282, 1.5, 0.75, 6.0, 6.0, 0.80, true, 0.20),
        "M4" => f(80.0, 0.0282, 1.5, 0.75, 6.0, 6.0, 0.80, true, 0.25),
        "O1A" => f(190.0, 0.0310, 1.4, 1.0, 2.0, 0.0, 0.0, false, 0.30),
        "O1B" => f(250.0, 0.0350, 1.7, 1.0, 3.0, 0.0, 0.0, false, 0.30),
        "S1" | "S2" | "S3" => f(75.0, 0.0297, 1.3, 0.75, 15.0, 0.0, 0.0, false, 0.25),
        "NONFUEL" | "NON-FUEL" | "WATER" | "NF" => return Some(StandardFuel::non_fuel(fuel_code)),
        _ => return None,
    })
}

/// Resolve one fuel lookup table entry into a `StandardFuel`, keyed by the
/// table's `fuel_type` descriptive string (spec §6's
/// `grid_value, export_value, descriptive_name, fuel_type` schema).
pub fn standard_fuel_for(fuel_type: &str, fuel_code: u16) -> CliResult<StandardFuel> {
    coefficients(fuel_type, fuel_code).ok_or_else(|| CliError::UnknownFuelType(fuel_type.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fuel_types_resolve() {
        assert!(standard_fuel_for("C2", 2).is_ok());
        assert!(standard_fuel_for("d1", 5).is_ok());
    }

    #[test]
    fn unknown_fuel_type_errors() {
        assert!(standard_fuel_for("Z9", 99).is_err());
    }

    #[test]
    fn non_fuel_never_carries_crown_fire() {
        let fuel = standard_fuel_for("water", 0).unwrap();
        assert!(!fuel.can_crown);
        assert_eq!(fuel.fuel_load, 0.0);
    }
}
