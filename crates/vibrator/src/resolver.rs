//! Service resolution across binder domains.
//!
//! Domains are searched strictly in the order given; the first domain whose
//! service manager knows the vibrator wins. Every connection opened for a losing
//! attempt is dropped before the next domain is opened, so at most one device is
//! open at any time.

use tracing::{debug, info, warn};

use crate::{Domain, InterfaceDialect, InterfaceName, Transport, VibratorError};

/// The service found by [`resolve`], tagged with the dialect of its domain.
///
/// Fields drop in declaration order, which releases the endpoint before the
/// connection it was obtained from.
pub struct ResolvedService<T: Transport> {
    /// Remote service object.
    pub endpoint: T::Endpoint,
    /// Connection the endpoint was looked up on.
    pub connection: T::Connection,
    /// Dialect spoken by the service.
    pub dialect: InterfaceDialect,
    /// Descriptor the service was registered under.
    pub interface: InterfaceName,
}

impl<T: Transport> std::fmt::Debug for ResolvedService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedService")
            .field("dialect", &self.dialect)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

/// Searches `domains` in order and returns the first resolved service.
///
/// # Errors
///
/// [`VibratorError::ServiceUnavailable`] if no domain could be opened or none
/// had the service registered. Per-domain failures are logged, not returned.
pub fn resolve<T: Transport>(
    transport: &T,
    domains: &[Domain],
) -> Result<ResolvedService<T>, VibratorError> {
    for domain in domains {
        let connection = match transport.open_domain(&domain.device) {
            Ok(connection) => connection,
            Err(source) => {
                let err = VibratorError::ConnectionUnavailable {
                    device: domain.device.clone(),
                    source,
                };
                warn!(device = %domain.device, error = %err, "skipping binder domain");
                continue;
            }
        };

        match transport.lookup_service(&connection, &domain.interface, &domain.slot) {
            Ok(Some(endpoint)) => {
                info!(
                    device = %domain.device,
                    interface = %domain.interface,
                    dialect = %domain.dialect,
                    "vibrator service resolved"
                );
                return Ok(ResolvedService {
                    endpoint,
                    connection,
                    dialect: domain.dialect,
                    interface: domain.interface.clone(),
                });
            }
            Ok(None) => debug!(
                device = %domain.device,
                interface = %domain.interface,
                slot = %domain.slot,
                "service not registered"
            ),
            Err(error) => warn!(
                device = %domain.device,
                interface = %domain.interface,
                %error,
                "service lookup failed"
            ),
        }
        drop(connection);
    }

    Err(VibratorError::ServiceUnavailable {
        attempts: domains.len(),
    })
}
