/// Lifecycle of a Server proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootStatus {
    #[default]
    Offline,
    Booting,
    Online,
    Quitting,
}
