// External I/O: OS monitors, signals and process management
pub mod dbus; // D-Bus and timerfd system event monitors
pub mod instance; // Running-instance discovery and control
pub mod lock; // Low-level lock file operations
pub mod signals; // Unix signal handling and the service channel
