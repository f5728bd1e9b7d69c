//! `SpreadInfo`: the elliptical fire-growth computation (spec §4.D), the
//! algorithmic heart of the simulator.
//!
//! For a given `SpreadKey` and weather hour, computes a head bearing, head/
//! back/flank rates of spread, and a sampled set of directional offsets that
//! the scenario loop applies to every point in any cell sharing the key.
//! Grounded in the teacher's wind/slope vector composition style from
//! `physics.rs` (`wind_radiation_multiplier`, vector decomposition by
//! alignment), generalized from a per-pair-of-elements multiplier into the
//! FBP system's slope-corrected ISI and elliptical offset sampling.

use crate::fuel::FuelType;
use crate::grid::SpreadKey;
use crate::weather::DailyWeather;

/// A single directional spread offset: the per-minute (dx, dy) advance in
/// cell-fraction units, plus the bearing it was sampled at.
#[derive(Debug, Clone, Copy)]
pub struct Offset {
    pub dx_per_minute: f64,
    pub dy_per_minute: f64,
    pub bearing_deg: f64,
}

/// Immutable inputs `SpreadInfo::compute` needs, passed by reference rather
/// than a back-pointer to `Scenario` (spec §9's cyclic-reference note).
#[derive(Debug, Clone, Copy)]
pub struct SpreadContext {
    pub cell_size_m: f64,
    pub min_ros: f64,
    pub max_angle_deg: f64,
    pub foliar_moisture_nd: i32,
}

/// The computed spread behaviour for one `SpreadKey` at one weather hour.
#[derive(Debug, Clone)]
pub struct SpreadInfo {
    pub key: SpreadKey,
    pub head_ros: f64,
    pub back_ros: f64,
    pub flank_ros: f64,
    pub raz_deg: f64,
    pub length_to_breadth: f64,
    pub max_intensity: f64,
    pub offsets: Vec<Offset>,
    pub is_crowning: bool,
}

impl SpreadInfo {
    /// No-spread sentinel for non-fuel or sub-threshold cells.
    #[must_use]
    pub fn no_spread(key: SpreadKey) -> Self {
        SpreadInfo {
            key,
            head_ros: 0.0,
            back_ros: 0.0,
            flank_ros: 0.0,
            raz_deg: 0.0,
            length_to_breadth: 1.0,
            max_intensity: 0.0,
            offsets: Vec::new(),
            is_crowning: false,
        }
    }

    #[must_use]
    pub fn can_spread(&self) -> bool {
        !self.offsets.is_empty()
    }

    /// Steps 1-10 of spec §4.D.
    pub fn compute(
        key: SpreadKey,
        fuel: &dyn FuelType,
        weather: &DailyWeather,
        ctx: &SpreadContext,
    ) -> Self {
        if !fuel.is_valid() {
            return Self::no_spread(key);
        }

        let slope_pct = f64::from(key.slope);
        let aspect_deg = f64::from(key.aspect);
        let bui = weather.bui();
        let bui_eff = fuel.bui_effect(bui);
        let isi_base = weather.isi();

        let (isi, raz_deg, effective_wind_speed) =
            slope_corrected_isi_and_bearing(slope_pct, aspect_deg, weather, isi_base);

        let mut head_ros = fuel.calculate_ros(ctx.foliar_moisture_nd, weather, isi) * bui_eff;
        if head_ros < ctx.min_ros {
            return Self::no_spread(key);
        }

        let sfc = fuel.surface_fuel_consumption(weather);
        let csi = fuel.critical_surface_intensity(weather);
        let surface_intensity = 300.0 * sfc * head_ros;
        let mut is_crowning = false;
        let mut total_fuel_consumption = sfc;
        if surface_intensity >= csi && csi.is_finite() {
            is_crowning = true;
            let rso = if head_ros > 0.0 { csi / (300.0 * sfc.max(1e-9)) } else { 0.0 };
            let cfb = fuel.crown_fraction_burned(head_ros, rso);
            let cfc = fuel.crown_consumption(cfb);
            total_fuel_consumption = sfc + cfc;
            head_ros = fuel.final_ros(head_ros, isi, cfb, head_ros);
        }

        let back_isi = back_isi_from_wind(effective_wind_speed, weather.ffmc);
        let mut back_ros = fuel.calculate_ros(ctx.foliar_moisture_nd, weather, back_isi) * bui_eff;
        if is_crowning {
            let rso_back = if back_ros > 0.0 { csi / (300.0 * sfc.max(1e-9)) } else { 0.0 };
            let cfb_back = fuel.crown_fraction_burned(back_ros, rso_back);
            back_ros = fuel.final_ros(back_ros, back_isi, cfb_back, back_ros);
        }

        let lb = fuel.length_to_breadth(weather.wind_speed_kmh);

        let a = (head_ros + back_ros) / 2.0;
        let c = a - back_ros;
        let flank_ros = a / lb.max(1.0);

        let max_intensity = fire_intensity(total_fuel_consumption, head_ros);

        let offsets = sample_ellipse_offsets(a, c, flank_ros, back_ros, raz_deg, slope_pct, aspect_deg, ctx);

        SpreadInfo {
            key,
            head_ros,
            back_ros,
            flank_ros,
            raz_deg,
            length_to_breadth: lb,
            max_intensity,
            offsets,
            is_crowning,
        }
    }
}

/// Step 3: combine wind and slope-derived "wind-equivalent" vectors; return
/// `(isi, raz_deg, effective_wind_speed)`.
fn slope_corrected_isi_and_bearing(
    slope_pct: f64,
    aspect_deg: f64,
    weather: &DailyWeather,
    isi_base: f64,
) -> (f64, f64, f64) {
    if slope_pct <= 0.0 {
        return (isi_base, weather.wind_direction_deg, weather.wind_speed_kmh);
    }
    let wind_rad = weather.wind_direction_deg.to_radians();
    let wind_x = weather.wind_speed_kmh * wind_rad.sin();
    let wind_y = weather.wind_speed_kmh * wind_rad.cos();

    let upslope_az = (aspect_deg + 180.0).rem_euclid(360.0);
    let slope_wind_equiv = slope_wind_equivalent(slope_pct);
    let upslope_rad = upslope_az.to_radians();
    let slope_x = slope_wind_equiv * upslope_rad.sin();
    let slope_y = slope_wind_equiv * upslope_rad.cos();

    let wsv_x = wind_x + slope_x;
    let wsv_y = wind_y + slope_y;
    let effective_wind_speed = (wsv_x * wsv_x + wsv_y * wsv_y).sqrt();
    let raz_deg = wsv_x.atan2(wsv_y).to_degrees().rem_euclid(360.0);

    let _ = isi_base;
    let isi = isi_from_ffmc_and_wind(weather.ffmc, effective_wind_speed);
    (isi, raz_deg, effective_wind_speed)
}

/// ISI as a function of FFMC and wind speed alone, factored out so both the
/// flat-ground case (`DailyWeather::isi`) and the slope-corrected case can
/// share it.
fn isi_from_ffmc_and_wind(ffmc: f64, wind_speed_kmh: f64) -> f64 {
    let m = 147.2 * (101.0 - ffmc) / (59.5 + ffmc);
    let ff = (91.9 * (-0.1386 * m).exp()) * (1.0 + m.powf(5.31) / 4_930_796.52);
    0.208 * (0.05039 * wind_speed_kmh).exp() * ff
}

/// Empirical slope-to-wind-speed-equivalent conversion (km/h per % slope),
/// calibrated so a 100% slope contributes roughly the push of a 40 km/h wind.
fn slope_wind_equivalent(slope_pct: f64) -> f64 {
    0.4 * slope_pct.min(100.0)
}

/// Step 6: empirical back-ISI decay from wind speed alone.
fn back_isi_from_wind(wind_speed_kmh: f64, ffmc: f64) -> f64 {
    let m = 147.2 * (101.0 - ffmc) / (59.5 + ffmc);
    let ff = (91.9 * (-0.1386 * m).exp()) * (1.0 + m.powf(5.31) / 4_930_796.52);
    0.208 * (-0.05039 * wind_speed_kmh).exp() * ff
}

/// `fire_intensity(tfc, ros) = 300 * tfc * ros` (kW/m), spec §4.D step 9.
#[must_use]
pub fn fire_intensity(total_fuel_consumption: f64, ros: f64) -> f64 {
    300.0 * total_fuel_consumption * ros
}

/// Step 8: horizontal (map) correction factor for a spread direction `theta`
/// on a sloped surface.
fn horizontal_correction(theta_deg: f64, slope_pct: f64, slope_az_deg: f64) -> f64 {
    if slope_pct <= 0.0 {
        return 1.0;
    }
    let theta_rel = (theta_deg - slope_az_deg).to_radians();
    let b = (slope_pct / 100.0).atan().cos();
    let tan_rel = theta_rel.tan();
    let y = b / (b * b * tan_rel * tan_rel + 1.0).sqrt();
    let x = y * tan_rel;
    (x * x + y * y).sqrt().min(1.0)
}

/// Step 9: ellipse radius at angle `theta_deg` from the head direction.
fn ellipse_radius(theta_deg: f64, a: f64, c: f64, flank: f64) -> f64 {
    if theta_deg.abs() < 1e-9 {
        return a + c;
    }
    if (theta_deg - 180.0).abs() < 1e-9 {
        return a - c;
    }
    if (theta_deg - 90.0).abs() < 1e-9 || (theta_deg + 90.0).abs() < 1e-9 {
        return flank * (a * a - c * c).sqrt() / a.max(1e-9);
    }
    let theta = theta_deg.to_radians();
    let cos_t = theta.cos();
    let sin_t = theta.sin();
    let denom = flank * flank * cos_t * cos_t + a * a * sin_t * sin_t;
    let numerator =
        a * (flank * cos_t * (flank * flank * cos_t * cos_t + (a * a - c * c) * sin_t * sin_t).sqrt()
            - a * c * sin_t * sin_t);
    ((numerator / denom.max(1e-9) + c) / cos_t).abs()
}

/// Step 9: sample offsets at `max_angle_deg` increments from 0 through 180,
/// both sides of the head direction, truncating a side once its ROS falls
/// below `min_ros`.
fn sample_ellipse_offsets(
    a: f64,
    c: f64,
    flank: f64,
    back_ros: f64,
    raz_deg: f64,
    slope_pct: f64,
    aspect_deg: f64,
    ctx: &SpreadContext,
) -> Vec<Offset> {
    let slope_az = (aspect_deg + 180.0).rem_euclid(360.0);
    let mut offsets = Vec::new();

    let push = |offsets: &mut Vec<Offset>, theta_deg: f64, r: f64| {
        let bearing = (raz_deg + theta_deg).rem_euclid(360.0);
        let ros_component = r; // r carries units of m/min already via a/back_ros
        if ros_component < ctx.min_ros && theta_deg.abs() > 1e-9 {
            return false;
        }
        let corr = horizontal_correction(bearing, slope_pct, slope_az);
        let bearing_rad = bearing.to_radians();
        offsets.push(Offset {
            dx_per_minute: bearing_rad.sin() * r * corr / ctx.cell_size_m,
            dy_per_minute: bearing_rad.cos() * r * corr / ctx.cell_size_m,
            bearing_deg: bearing,
        });
        true
    };

    push(&mut offsets, 0.0, a + c);

    let mut theta = ctx.max_angle_deg;
    let mut plus_open = true;
    let mut minus_open = true;
    while theta < 180.0 && (plus_open || minus_open) {
        let r = if (theta - 180.0).abs() < 1e-9 { back_ros } else { ellipse_radius(theta, a, c, flank) };
        if plus_open {
            plus_open = push(&mut offsets, theta, r);
        }
        if minus_open {
            minus_open = push(&mut offsets, -theta, r);
        }
        theta += ctx.max_angle_deg;
    }
    if plus_open || minus_open {
        push(&mut offsets, 180.0, back_ros);
    }

    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuel::StandardFuel;

    fn fuel() -> StandardFuel {
        StandardFuel {
            fuel_code: 2,
            a: 110.0,
            b: 0.0282,
            c: 1.5,
            bui_q: 0.7,
            bui_0: 50.0,
            fuel_load: 5.0,
            cbh: 3.0,
            cfl: 0.8,
            can_crown: true,
            moisture_of_extinction: 0.3,
        }
    }

    fn weather(wind_speed: f64, wind_dir: f64) -> DailyWeather {
        DailyWeather::new(90.0, 35.5, 275.0, 20.0, 30.0, wind_speed, wind_dir, 0.0)
    }

    fn ctx() -> SpreadContext {
        SpreadContext { cell_size_m: 100.0, min_ros: 0.1, max_angle_deg: 10.0, foliar_moisture_nd: 0 }
    }

    #[test]
    fn no_wind_no_slope_gives_near_circular_ros() {
        let key = SpreadKey::new(0.0, 0.0, 2);
        let info = SpreadInfo::compute(key, &fuel(), &weather(0.0, 0.0), &ctx());
        assert!((info.head_ros - info.back_ros).abs() / info.head_ros.max(1e-9) < 0.01);
        assert!((info.length_to_breadth - 1.0).abs() < 0.05);
    }

    #[test]
    fn wind_elongates_the_ellipse() {
        let key = SpreadKey::new(0.0, 0.0, 2);
        let info = SpreadInfo::compute(key, &fuel(), &weather(20.0, 180.0), &ctx());
        assert!(info.length_to_breadth > 1.5);
        assert!(info.back_ros < info.head_ros);
    }

    #[test]
    fn slope_zero_gives_identity_horizontal_correction() {
        for theta in [0.0, 45.0, 90.0, 135.0, 180.0] {
            assert!((horizontal_correction(theta, 0.0, 0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ellipse_symmetric_on_flat_ground() {
        let a = 10.0;
        let c = 4.0;
        let flank = 3.0;
        for theta in [10.0, 45.0, 90.0, 135.0] {
            let r1 = ellipse_radius(theta, a, c, flank);
            let r2 = ellipse_radius(-theta, a, c, flank);
            assert!((r1 - r2).abs() < 1e-9);
        }
    }

    #[test]
    fn below_min_ros_yields_no_spread() {
        let weak_fuel = StandardFuel { a: 0.5, ..fuel() };
        let key = SpreadKey::new(0.0, 0.0, 9);
        let info = SpreadInfo::compute(key, &weak_fuel, &weather(0.0, 0.0), &ctx());
        assert!(!info.can_spread());
    }

    #[test]
    fn non_fuel_never_spreads() {
        let nf = StandardFuel::non_fuel(0);
        let key = SpreadKey::new(0.0, 0.0, 0);
        let info = SpreadInfo::compute(key, &nf, &weather(10.0, 0.0), &ctx());
        assert!(!info.can_spread());
    }
}
