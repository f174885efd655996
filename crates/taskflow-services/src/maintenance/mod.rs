mod service;

pub use service::LockMaintenanceService;
