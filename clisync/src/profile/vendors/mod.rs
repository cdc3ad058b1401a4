//! Built-in device profiles.

pub mod arista;
pub mod cisco;
pub mod f5;
pub mod hp_comware;
pub mod linux;
pub mod mellanox;
pub mod oneaccess;
pub mod sixwind;

use super::DeviceProfile;

/// Every built-in profile, in registration order.
pub fn builtin() -> Vec<DeviceProfile> {
    vec![
        cisco::profile(),
        arista::profile(),
        hp_comware::profile(),
        mellanox::profile(),
        sixwind::profile(),
        oneaccess::profile(),
        f5::profile(),
        linux::profile(),
    ]
}
