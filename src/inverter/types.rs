use serde::Deserialize;

/// Core inverter profile from the vendor's paged list endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterData {
    pub serial_num: String,
    #[serde(default)]
    pub plant_name: String,
    pub device_type: i32,
    #[serde(default)]
    pub power_rating: i32,
    #[serde(default)]
    pub bat_capacity: i32,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub lost: bool,
    #[serde(default)]
    pub last_update_time: String,
}

/// Lifetime and day energy counters, fetched independently of the
/// profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterEnergy {
    #[serde(default)]
    pub serial_num: String,
    pub today_yielding: i32,
    pub today_charging: i32,
    pub today_discharging: i32,
    pub today_usage: i32,
    pub today_import: i32,
    pub today_export: i32,
    pub total_yielding: i32,
    pub total_usage: i32,
    pub total_charging: i32,
    pub total_discharging: i32,
}

/// Live electrical readings, fetched independently of the profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InverterRuntime {
    #[serde(default)]
    pub serial_num: String,
    pub status: i32,
    #[serde(default)]
    pub status_text: String,
    pub soc: i32,
    pub v_bat: i32,
    pub ppv1: i32,
    pub ppv2: i32,
    pub ppv3: i32,
    pub p_charge: i32,
    pub p_dis_charge: i32,
    pub pinv: i32,
    pub prec: i32,
    pub p_to_user: i32,
    pub p_to_grid: i32,
    #[serde(default)]
    pub device_time: String,
}
