// ── Serializing executor ──
//
// One task owns the driver and every registry. Caller commands and
// hardware callbacks both arrive as channel messages and are handled one
// at a time, so a stop racing a tag event for the same session is simply
// two messages in some order.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Envelope;
use crate::command::{Command, CommandName};
use crate::completion::{CompletionRouter, PendingKind};
use crate::config::BridgeConfig;
use crate::driver::{HardwareCallback, InventoryHandle, ReaderDriver, TagAccessRequest};
use crate::encode::{
    self, ConnectionBroadcast, FirmwareCompletionPayload, FirmwareProgressPayload,
    SdkInfoPayload, ValuePayload,
};
use crate::error::CoreError;
use crate::listener::ListenerRegistry;
use crate::model::ConnectionState;
use crate::reply::ReplySink;
use crate::rfid_config::{InventoryType, RfidConfiguration, catalog_payload};
use crate::session::{EventInterest, Routed, SessionRegistry, TargetEpcs};

pub(crate) struct Executor<D> {
    config: BridgeConfig,
    driver: D,
    sessions: SessionRegistry,
    listeners: ListenerRegistry,
    completions: CompletionRouter,
    connection_state: watch::Sender<ConnectionState>,
}

impl<D: ReaderDriver> Executor<D> {
    pub(crate) fn new(
        config: BridgeConfig,
        driver: D,
        connection_state: watch::Sender<ConnectionState>,
    ) -> Self {
        Self {
            config,
            driver,
            sessions: SessionRegistry::new(),
            listeners: ListenerRegistry::new(),
            completions: CompletionRouter::new(),
            connection_state,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        mut callbacks: mpsc::UnboundedReceiver<HardwareCallback>,
        cancel: CancellationToken,
    ) {
        info!("bridge executor started");
        if self.config.logging_status != 0 {
            self.driver.set_logging_status(self.config.logging_status);
        }
        if self.config.auto_open_connection {
            self.driver.open_connection();
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                callback = callbacks.recv() => {
                    let Some(callback) = callback else { break };
                    self.on_callback(callback);
                }
                envelope = commands.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.on_envelope(envelope);
                }
            }
        }

        self.reset();
        info!("bridge executor stopped");
    }

    fn on_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Command { name, args, reply } => match Command::decode(&name, &args) {
                Ok(command) => self.dispatch(command, reply),
                Err(CoreError::UnknownCommand { name }) => {
                    warn!(command = %name, "unknown command, ignoring");
                }
                Err(e) => {
                    warn!(command = %name, error = %e, "command arguments rejected");
                    reply.fail(&e);
                }
            },
            Envelope::Reset { done } => {
                self.reset();
                let _ = done.send(());
            }
        }
    }

    // ── Command dispatch ─────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    fn dispatch(&mut self, command: Command, reply: ReplySink) {
        let name = command.name();
        debug!(command = %name, "dispatching command");

        match command {
            // ── Inventory ────────────────────────────────────────
            Command::StartInventory {
                id,
                config,
                targets,
                interest,
            } => self.start_inventory(&id, &config, &targets, interest, reply),
            Command::StopInventory { id } => self.stop_inventory(name, &id, reply),
            Command::PauseInventory { id } => match self.sessions.pause(name.as_str(), &id) {
                Ok(handle) => {
                    self.driver.pause_inventory(handle);
                    reply.finish(Value::Null);
                }
                Err(e) => reject(name, reply, &e),
            },
            Command::ResumeInventory { id } => match self.sessions.resume(name.as_str(), &id) {
                Ok(handle) => {
                    self.driver.resume_inventory(handle);
                    reply.finish(Value::Null);
                }
                Err(e) => reject(name, reply, &e),
            },
            Command::TagAccess { id, request, .. } => self.tag_access(name, &id, request, reply),

            // ── Connection ───────────────────────────────────────
            Command::AddConnectionStateCallback { listener } => {
                self.listeners.register(listener, reply);
            }
            Command::RemoveConnectionStateCallback { listener } => {
                self.listeners.unregister(listener);
                reply.finish(Value::Null);
            }
            Command::OpenConnection => {
                self.driver.open_connection();
                reply.finish(Value::Null);
            }
            Command::CloseConnection => {
                self.close_connection();
                reply.finish(Value::Null);
            }
            Command::GetBatteryInfo => finish_with(reply, "batteryInfo", &self.driver.battery_info()),

            // ── Firmware ─────────────────────────────────────────
            Command::AutomaticCheckForFirmwareUpdate => {
                let ticket = self.completions.register(PendingKind::FirmwareCheck, reply);
                self.driver
                    .check_for_firmware_update(ticket, self.config.firmware_channel);
            }
            Command::LoadUpdateWithName { name: update } => {
                let ticket = self.completions.register(PendingKind::FirmwareLoad, reply);
                self.driver.load_update(ticket, &update);
            }
            Command::FirmwareUpdate => match self.completions.begin_firmware_update(reply) {
                Ok(()) => self.driver.firmware_update(),
                Err(e) => warn!(error = %e, "firmware update refused"),
            },
            Command::ForceFirmwareChannelReload {
                only_if_some_time_has_passed,
            } => {
                self.driver
                    .force_firmware_channel_reload(only_if_some_time_has_passed);
                reply.finish(Value::Null);
            }
            Command::ForceFirmwareGrokkerCheck => {
                self.driver.force_firmware_check();
                reply.finish(Value::Null);
            }

            // ── Region ───────────────────────────────────────────
            Command::GetRegionNames => {
                let ticket = self.completions.register(PendingKind::RegionNames, reply);
                self.driver.region_names(ticket);
            }
            Command::SetRegion { name: region } => {
                let ticket = self.completions.register(PendingKind::RegionSet, reply);
                self.driver.set_region(ticket, &region);
            }
            Command::UserMustSetRegion => {
                let value = self.driver.user_must_set_region();
                finish_with(reply, "userMustSetRegion", &ValuePayload { value });
            }
            Command::UserCanSetRegion => {
                let value = self.driver.user_can_set_region();
                finish_with(reply, "userCanSetRegion", &ValuePayload { value });
            }

            // ── Internal ─────────────────────────────────────────
            Command::GetSdkStaticInfo => {
                let info = SdkInfoPayload::from(&self.driver.sdk_info());
                finish_with(reply, "sdkInfo", &info);
            }
            Command::GetRfidConfigs => {
                reply.finish(catalog_payload(&InventoryType::ALL));
            }
            Command::SetLogging { mask } => {
                self.driver.set_logging_status(mask);
                reply.finish(Value::Null);
            }
            Command::Log { message } => {
                info!(target: "tagbridge::caller", "{message}");
                reply.finish(Value::Null);
            }
        }
    }

    fn start_inventory(
        &mut self,
        id: &str,
        config: &RfidConfiguration,
        targets: &TargetEpcs,
        interest: EventInterest,
        reply: ReplySink,
    ) {
        match self.sessions.start(id, interest, reply) {
            Ok(handle) => {
                debug!(session = id, %handle, ?targets, "starting inventory");
                self.driver.start_inventory(handle, config, targets);
            }
            Err(e) => warn!(error = %e, "inventory start rejected"),
        }
    }

    fn stop_inventory(&mut self, name: CommandName, id: &str, reply: ReplySink) {
        match self.sessions.begin_stop(name.as_str(), id) {
            Ok(handle) => {
                let ticket = self
                    .completions
                    .register_for(handle, PendingKind::StopInventory, reply);
                self.driver.stop_inventory(handle, Some(ticket));
            }
            Err(e) => reject(name, reply, &e),
        }
    }

    fn tag_access(
        &mut self,
        name: CommandName,
        id: &str,
        request: TagAccessRequest,
        reply: ReplySink,
    ) {
        match self.sessions.handle_for(name.as_str(), id) {
            Ok(handle) => {
                let kind = PendingKind::for_tag_access(&request);
                let ticket = self.completions.register_for(handle, kind, reply);
                self.driver.tag_access(handle, ticket, request);
            }
            Err(e) => reject(name, reply, &e),
        }
    }

    // ── Hardware callbacks ───────────────────────────────────────

    fn on_callback(&mut self, callback: HardwareCallback) {
        match callback {
            HardwareCallback::Inventory { handle, event } => {
                if let Routed::Final(handle) = self.sessions.route(handle, &event) {
                    self.driver.release_inventory(handle);
                }
            }
            HardwareCallback::Completed { ticket, completion } => {
                if let Some(reply) = self.completions.complete(ticket, &completion) {
                    if let Some(payload) = encode::completion(&completion) {
                        reply.finish(payload);
                    }
                }
            }
            HardwareCallback::FirmwareProgress {
                amount_done,
                amount_total,
                can_cancel,
            } => {
                let Some(reply) = self.completions.firmware_sink() else {
                    debug!("firmware progress with no update in flight, dropping");
                    return;
                };
                let progress = FirmwareProgressPayload {
                    amount_done,
                    amount_total,
                    can_cancel,
                };
                if let Some(payload) = encode::to_payload("firmwareProgress", &progress) {
                    reply.send(payload);
                }
            }
            HardwareCallback::FirmwareCompleted { result, seconds } => {
                let Some(reply) = self.completions.end_firmware_update() else {
                    debug!("firmware completion with no update in flight, dropping");
                    return;
                };
                info!(result = result.0, seconds, "firmware update finished");
                finish_with(
                    reply,
                    "firmwareCompleted",
                    &FirmwareCompletionPayload::new(result, seconds),
                );
            }
            HardwareCallback::ConnectionStateChanged { state, reader } => {
                self.connection_state.send_replace(state);
                let snapshot = ConnectionBroadcast::new(state, &reader);
                let delivered = self.listeners.broadcast(&snapshot);
                info!(?state, listeners = delivered, "reader connection state changed");
            }
        }
    }

    // ── Teardown ─────────────────────────────────────────────────

    fn force_stop_sessions(&mut self) -> Vec<InventoryHandle> {
        let handles = self.sessions.drain();
        for &handle in &handles {
            debug!(%handle, "force-stopping inventory");
            self.driver.stop_inventory(handle, None);
            self.driver.release_inventory(handle);
        }
        handles
    }

    /// Force-stop all sessions, dropping their outstanding tag operations
    /// and any firmware update, then unregister listeners and close.
    fn close_connection(&mut self) {
        let stopped = self.force_stop_sessions();
        self.completions.abandon_inventories(&stopped);
        if self.completions.end_firmware_update().is_some() {
            debug!("dropping in-flight firmware update");
        }
        self.listeners.clear();
        if self.driver.is_connection_open() {
            self.driver.close_connection();
        }
    }

    /// Unregister all listeners, force-stop all sessions, drop pending
    /// completions and close the connection if open.
    fn reset(&mut self) {
        self.listeners.clear();
        self.force_stop_sessions();
        self.completions.clear();
        if self.driver.is_connection_open() {
            self.driver.close_connection();
        }
        debug!("bridge state reset");
    }
}

fn reject(name: CommandName, reply: ReplySink, error: &CoreError) {
    warn!(command = %name, error = %error, "command failed");
    reply.fail(error);
}

fn finish_with<T: Serialize>(reply: ReplySink, what: &'static str, payload: &T) {
    if let Some(payload) = encode::to_payload(what, payload) {
        reply.finish(payload);
    }
}
