// Messages
pub const MESSAGE_OK: &str = "ok";
pub const MESSAGE_DEVICE_REGISTERED: &str = "Device registered";
pub const MESSAGE_DEPLOYMENT_RESET: &str = "Network deployment reset";
pub const MESSAGE_RULES_EVALUATED: &str = "Rules evaluated";
pub const MESSAGE_VALIDATION_FAILED: &str = "Validation failed";
pub const MESSAGE_INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
pub const MESSAGE_EMPTY_DEPLOYMENT: &str = "Network deployment does not contain any devices";

// Deepest device tree accepted, counting the root as level 1
pub const MAX_TREE_LEVELS: usize = 32;

// Error codes
pub const CODE_BAD_REQUEST: &str = "BAD_REQUEST";
pub const CODE_NOT_FOUND: &str = "NOT_FOUND";
pub const CODE_INTERNAL: &str = "INTERNAL";

// Routes
pub const API_PREFIX: &str = "/api/v1";
pub const DEVICES_SCOPE: &str = "/network-deployment/devices";

// Misc
pub const EMPTY: &str = "";
