// Transport defaults
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/uds_socket";
pub const MAX_FRAME_BYTES: u64 = 64 * 1024 * 1024; // Upper bound on one request frame

// Window parameters
pub const LOOK_BACK: usize = 100; // Number of trailing samples per input window
pub const LOOK_FORWARD: usize = 60; // Forecast horizon in samples

// Training parameters
pub const EPOCHS: usize = 100;
pub const BATCH_SIZE: usize = LOOK_FORWARD / 10;
pub const HIDDEN_SIZE: usize = 256;
pub const NUM_LAYERS: usize = 2;
pub const LEARNING_RATE: f64 = 0.001;
pub const DROPOUT: f64 = 0.2;

// Model paths
pub const DEFAULT_MODEL_DIR: &str = "models";
