use crate::HealthRes;

/// Health service shared by the REST server and the CLI.
#[derive(Clone, Copy, Debug)]
pub struct HealthService;

impl HealthService {
    /// Reports the service as healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Libris upload API is alive".into(),
        }
    }
}
