//! D-Bus session bus adapter.
//!
//! Claims the well-known name, emits the outbound signals, and serves the
//! small inbound query interface over the shared derived state.

use super::{BusSignal, PublishError, Publisher, SignalBody};
use crate::state::SharedState;
use async_trait::async_trait;
use tracing::{debug, info};
use zbus::Connection;
use zbus::names::BusName;

/// Object path all signals are emitted from and queries served at.
pub const OBJECT_PATH: &str = "/org/wayland/compositor";

/// Interface name for signals and queries.
pub const INTERFACE: &str = "org.wayland.compositor";

/// Inbound query surface backed by the derived state store.
struct StateQuery {
    state: SharedState,
}

#[zbus::interface(name = "org.wayland.compositor")]
impl StateQuery {
    /// Id of the currently focused view, 0 when none.
    fn focused_view(&self) -> u32 {
        self.state.lock().focused_view_id()
    }

    /// Whether geometry-change signals are currently published.
    fn geometry_signal(&self) -> bool {
        self.state.lock().geometry_signal()
    }
}

/// Publisher backed by a zbus session connection.
pub struct DbusPublisher {
    connection: Connection,
    bus_name: String,
}

impl DbusPublisher {
    /// Connect to the session bus, claim `bus_name`, and serve the query
    /// interface. Failure here is fatal to the bridge.
    pub async fn acquire(bus_name: &str, state: SharedState) -> Result<Self, PublishError> {
        let acquire_failed = |source| PublishError::AcquireFailed {
            name: bus_name.to_string(),
            source,
        };

        let connection = zbus::connection::Builder::session()
            .map_err(acquire_failed)?
            .name(bus_name.to_string())
            .map_err(acquire_failed)?
            .serve_at(OBJECT_PATH, StateQuery { state })
            .map_err(acquire_failed)?
            .build()
            .await
            .map_err(acquire_failed)?;

        info!("Acquired bus name {}", bus_name);
        Ok(Self {
            connection,
            bus_name: bus_name.to_string(),
        })
    }
}

#[async_trait]
impl Publisher for DbusPublisher {
    async fn emit(&mut self, signal: BusSignal) -> Result<(), PublishError> {
        let BusSignal { topic, body } = signal;
        debug!("Emitting {}", topic);

        let conn = &self.connection;
        let dest = Option::<BusName<'_>>::None;
        match body {
            SignalBody::Empty => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &()).await?;
            }
            SignalBody::Id(id) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id,)).await?;
            }
            SignalBody::IdStr(id, s) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id, s)).await?;
            }
            SignalBody::IdBool(id, b) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id, b)).await?;
            }
            SignalBody::IdFlags(id, flags) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id, flags)).await?;
            }
            SignalBody::IdOutputs(id, old, new) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id, old, new)).await?;
            }
            SignalBody::IdRect(id, x, y, w, h) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(id, x, y, w, h)).await?;
            }
            SignalBody::Pointer(x, y, button, released) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(x, y, button, released))
                    .await?;
            }
            SignalBody::Workspace(output, horiz, vert) => {
                conn.emit_signal(dest, OBJECT_PATH, INTERFACE, topic, &(output, horiz, vert))
                    .await?;
            }
        }

        Ok(())
    }

    async fn unload(&mut self) -> Result<(), PublishError> {
        info!("Releasing bus name {}", self.bus_name);
        self.connection.release_name(self.bus_name.as_str()).await?;
        Ok(())
    }
}
