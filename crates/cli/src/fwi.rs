//! Daily Canadian Fire Weather Index carry-forward: FFMC/DMC/DC updates from
//! noon weather observations, outside `firegrowth_core` per its Non-goal
//! excluding FWI derivation (the core only consumes already-computed
//! indices). Implements the standard Van Wagner (1987) daily equations so
//! the weather CSV's raw `PREC,TEMP,RH,WS` columns can be carried forward
//! from the seed indices given on the command line.

/// Fine Fuel Moisture Code, updated from yesterday's FFMC and today's noon
/// weather.
#[must_use]
pub fn update_ffmc(ffmc_prev: f64, temp_c: f64, rh_pct: f64, wind_kmh: f64, precip_mm: f64) -> f64 {
    let mo = 147.2 * (101.0 - ffmc_prev) / (59.5 + ffmc_prev);
    let mo = if precip_mm > 0.5 {
        let rf = precip_mm - 0.5;
        let mo = if mo > 150.0 {
            mo + 42.5 * rf * (-8.685 * (-rf / 100.0).exp()).exp() * (1.0 - (-6.93 / rf.max(1e-6)).exp())
                + 0.0015 * (mo - 150.0).powi(2) * rf.sqrt()
        } else {
            mo + 42.5 * rf * (-8.685 * (-rf / 100.0).exp()).exp() * (1.0 - (-6.93 / rf.max(1e-6)).exp())
        };
        mo.min(250.0)
    } else {
        mo
    };

    let ed = 0.942 * rh_pct.powf(0.679)
        + 11.0 * (0.18 * (10.0 - 1.0).max(0.0)).exp()
        + 0.18 * (21.1 - temp_c) * (1.0 - (-0.115 * rh_pct).exp());
    let ew = 0.618 * rh_pct.powf(0.753)
        + 10.0 * (0.18 * (10.0 - 1.0).max(0.0)).exp()
        + 0.18 * (21.1 - temp_c) * (1.0 - (-0.115 * rh_pct).exp());

    let m = if mo > ed {
        let ko = 0.424 * (1.0 - (rh_pct / 100.0).powf(1.7))
            + 0.0694 * wind_kmh.sqrt() * (1.0 - (rh_pct / 100.0).powi(8));
        let kd = ko * 0.581 * (0.0365 * temp_c).exp();
        ed + (mo - ed) * 10.0_f64.powf(-kd)
    } else if mo < ew {
        let k1 = 0.424 * (1.0 - ((100.0 - rh_pct) / 100.0).powf(1.7))
            + 0.0694 * wind_kmh.sqrt() * (1.0 - ((100.0 - rh_pct) / 100.0).powi(8));
        let kw = k1 * 0.581 * (0.0365 * temp_c).exp();
        ew - (ew - mo) * 10.0_f64.powf(-kw)
    } else {
        mo
    };

    (101.0 - (m / (147.2 + m)) * 147.2).clamp(0.0, 101.0)
}

/// Duff Moisture Code, month-insensitive day-length factor fixed at a
/// mid-latitude summer value since the scenario loop never spans a
/// latitude-dependent season table.
#[must_use]
pub fn update_dmc(dmc_prev: f64, temp_c: f64, rh_pct: f64, precip_mm: f64) -> f64 {
    const LE: f64 = 9.0;
    let rk = if temp_c < -1.1 {
        0.0
    } else {
        1.894 * (temp_c + 1.1) * (100.0 - rh_pct) * LE * 0.0001
    };

    let dmc_after_rain = if precip_mm > 1.5 {
        let re = 0.92 * precip_mm - 1.27;
        let mo = 20.0 + (280.0 / (4.0 * (-0.023 * dmc_prev).exp())).exp();
        let b = if dmc_prev <= 33.0 {
            100.0 / (0.5 + 0.3 * dmc_prev)
        } else if dmc_prev <= 65.0 {
            14.0 - 1.3 * dmc_prev.ln()
        } else {
            6.2 * dmc_prev.ln() - 17.2
        };
        let mr = mo + 1000.0 * re / (48.77 + b * re);
        (43.43 * (5.6348 - (mr - 20.0).max(0.01).ln())).max(0.0)
    } else {
        dmc_prev
    };

    (dmc_after_rain + rk).max(0.0)
}

/// Drought Code.
#[must_use]
pub fn update_dc(dc_prev: f64, temp_c: f64, precip_mm: f64) -> f64 {
    const LF: f64 = 1.4;
    let v = if temp_c < -2.8 { 0.0 } else { 0.36 * (temp_c + 2.8) + LF };

    let dc_after_rain = if precip_mm > 2.8 {
        let rd = 0.83 * precip_mm - 1.27;
        let qo = 800.0 * (-dc_prev / 400.0).exp();
        let qr = qo + 3.937 * rd;
        (400.0 * (800.0 / qr.max(1e-6)).ln()).max(0.0)
    } else {
        dc_prev
    };

    (dc_after_rain + 0.5 * v).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmc_rises_in_hot_dry_windy_weather() {
        let updated = update_ffmc(80.0, 30.0, 20.0, 25.0, 0.0);
        assert!(updated > 80.0);
    }

    #[test]
    fn ffmc_falls_after_heavy_rain() {
        let updated = update_ffmc(92.0, 15.0, 70.0, 5.0, 20.0);
        assert!(updated < 92.0);
    }

    #[test]
    fn dmc_and_dc_never_go_negative() {
        assert!(update_dmc(0.0, -10.0, 100.0, 0.0) >= 0.0);
        assert!(update_dc(0.0, -20.0, 0.0) >= 0.0);
    }

    #[test]
    fn dc_drops_after_rain() {
        let updated = update_dc(400.0, 20.0, 30.0);
        assert!(updated < 400.0);
    }
}
