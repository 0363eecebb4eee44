//! 地理围栏校验
//!
//! 顾客下单时上报 `"lat,lon"`，距离餐厅超过半径则拒绝。
//! 距离按 WGS-84 椭球 Vincenty 反解计算；近对跖点不收敛时退回球面 haversine。

use shared::error::{AppError, ErrorCode};

/// WGS-84 长半轴（米）
const WGS84_A: f64 = 6_378_137.0;
/// WGS-84 扁率
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS-84 短半轴（米）
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);
/// 平均地球半径（米），haversine 使用
const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

const VINCENTY_MAX_ITERATIONS: usize = 200;
const VINCENTY_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Parse a `"lat,lon"` string
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || {
            AppError::new(ErrorCode::InvalidLocation).with_detail("location", raw.to_string())
        };

        let (lat, lon) = raw.split_once(',').ok_or_else(invalid)?;
        let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
        let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;

        if !latitude.is_finite()
            || !longitude.is_finite()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(invalid());
        }

        Ok(Self::new(latitude, longitude))
    }
}

/// Result of a geofence check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceDecision {
    pub distance_meters: f64,
    pub radius_meters: f64,
}

impl GeofenceDecision {
    pub fn admitted(&self) -> bool {
        self.distance_meters <= self.radius_meters
    }

    /// `OutOfRange` error when the claimed location is outside the radius
    pub fn into_result(self) -> Result<(), AppError> {
        if self.admitted() {
            Ok(())
        } else {
            Err(AppError::out_of_range(
                self.distance_meters,
                self.radius_meters,
            ))
        }
    }
}

/// Admit iff the claimed location is within `radius_meters` of the restaurant
pub fn admit(restaurant: Coordinate, radius_meters: f64, claimed: Coordinate) -> bool {
    check(restaurant, radius_meters, claimed).admitted()
}

pub fn check(restaurant: Coordinate, radius_meters: f64, claimed: Coordinate) -> GeofenceDecision {
    GeofenceDecision {
        distance_meters: distance_meters(restaurant, claimed),
        radius_meters,
    }
}

/// Geodesic surface distance in meters
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    vincenty_inverse(a, b).unwrap_or_else(|| haversine(a, b))
}

/// Vincenty inverse formula on the WGS-84 ellipsoid. `None` if it does not converge.
fn vincenty_inverse(p1: Coordinate, p2: Coordinate) -> Option<f64> {
    let l = (p2.longitude - p1.longitude).to_radians();
    let u1 = ((1.0 - WGS84_F) * p1.latitude.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * p2.latitude.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        let sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // 重合点
            return Some(0.0);
        }
        let cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        let sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        // 赤道线上 cos²α = 0
        let cos_2sigma_m = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        };
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m
                            + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if (lambda - lambda_prev).abs() < VINCENTY_TOLERANCE {
            let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
            let a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
            let b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
            let delta_sigma = b
                * sin_sigma
                * (cos_2sigma_m
                    + b / 4.0
                        * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                            - b / 6.0
                                * cos_2sigma_m
                                * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                                * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
            return Some(WGS84_B * a * (sigma - delta_sigma));
        }
    }

    None
}

fn haversine(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS * h.sqrt().asin()
}
