//! Mode and command coordination
//!
//! The coordinator owns the mode, the surface manager and the click monitor,
//! and runs every command on the UI thread. Commands are validated and their
//! geometry resolved and their annotation rendered before the mode changes,
//! so a failed command leaves all state as it was. Two steps run after the
//! transition and can still fail: starting the monitor when entering Observe
//! and creating the native surface.

use std::rc::Rc;
use std::sync::mpsc::Sender;

use crate::app::error::CommandError;
use crate::app::runtime::UiHandle;
use crate::app::state::{Mode, StateMachine, Transition};
use crate::config::BeaconConfig;
use crate::input::ClickMonitor;
use crate::platform::{Permission, PermissionGate, Platform};
use crate::protocol::command::{ActParams, Anchor, CancelParams, ModeParams, ObserveParams};
use crate::protocol::{Command, Outbound, ProtocolError, Response, now_ms};
use crate::ui::overlay::{PreparedAnnotation, Readiness, SurfaceManager};

type Reply = Result<Option<Response>, CommandError>;

pub struct Coordinator {
    mode: Mode,
    surfaces: SurfaceManager,
    monitor: ClickMonitor,
    permissions: Rc<dyn PermissionGate>,
    ui: UiHandle,
    outbound: Sender<Outbound>,
    show_observe_box: bool,
}

impl Coordinator {
    /// Builds the coordinator in Observe mode and starts the click monitor
    pub fn new(platform: Platform, config: &BeaconConfig, ui: UiHandle, outbound: Sender<Outbound>) -> Self {
        let surfaces = SurfaceManager::new(&platform, config);
        let monitor = ClickMonitor::new(
            platform.pointer,
            Rc::clone(&platform.permissions),
            config.click_throttle(),
            outbound.clone(),
        );
        let mut coordinator = Self {
            mode: Mode::default(),
            surfaces,
            monitor,
            permissions: platform.permissions,
            ui,
            outbound,
            show_observe_box: config.show_observe_box,
        };
        if let Err(e) = coordinator.monitor.start() {
            tracing::warn!(error = %e, "starting in observe mode without click monitoring");
        }
        coordinator
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn surfaces(&self) -> &SurfaceManager {
        &self.surfaces
    }

    pub fn monitor(&self) -> &ClickMonitor {
        &self.monitor
    }

    /// Runs one inbound command and writes its reply
    pub fn handle(&mut self, command: Result<Command, ProtocolError>) {
        let reply = match command {
            Ok(command) => {
                tracing::debug!(command = command.name(), "dispatching command");
                self.dispatch(command)
            }
            Err(e) => Err(e.into()),
        };
        self.reply(reply);
    }

    fn dispatch(&mut self, command: Command) -> Reply {
        match command {
            Command::Act(params) => self.act(params),
            Command::Observe(params) => self.observe(params),
            Command::Mode(params) => self.change_mode(params).map(Some),
            Command::Cancel(params) => Ok(Some(self.cancel(params))),
            Command::Clear => Ok(Some(self.clear())),
            Command::Status => Ok(Some(self.status())),
        }
    }

    fn reply(&self, reply: Reply) {
        let outbound = match reply {
            Ok(Some(response)) => Outbound::Response(response),
            Ok(None) => return,
            Err(e) => {
                tracing::info!(error = %e, "command failed");
                Outbound::error(e)
            }
        };
        if self.outbound.send(outbound).is_err() {
            tracing::warn!("outbound channel closed, dropping reply");
        }
    }

    fn require(&self, permission: Permission) -> Result<(), CommandError> {
        if self.permissions.is_granted(permission) {
            Ok(())
        } else {
            Err(CommandError::PermissionDenied(permission))
        }
    }

    fn act(&mut self, params: ActParams) -> Reply {
        self.require(Permission::Accessibility)?;
        let readiness = self.surfaces.prepare_target(
            &params.target_bundle_id,
            params.activate_app,
            params.bypass_focus_check,
        )?;

        match readiness {
            Readiness::Ready => self.draw(&params).map(Some),
            Readiness::Settling(delay) => {
                tracing::debug!(app = %params.target_bundle_id, ?delay, "waiting for activation to settle");
                self.ui.schedule_after(
                    delay,
                    Box::new(move |coordinator: &mut Coordinator| {
                        let reply = coordinator.draw(&params).map(Some);
                        coordinator.reply(reply);
                    }),
                );
                Ok(None)
            }
        }
    }

    /// Places and shows the temporary box, then arms its dismissal
    fn draw(&mut self, params: &ActParams) -> Result<Response, CommandError> {
        let placement = match params.anchor {
            Anchor::Center => self
                .surfaces
                .place_centered(&params.target_bundle_id, params.size())?,
            Anchor::Offset => self
                .surfaces
                .place_at_offset(&params.target_bundle_id, params.relative_rect())?,
        };

        let prepared = self.surfaces.prepare_temporary(&placement, params.caption.clone())?;

        self.enter(Mode::Act)?;
        let serial = self.surfaces.show_temporary(prepared)?;
        let handle = self.ui.schedule_after(
            self.surfaces.dismiss_after(),
            Box::new(move |coordinator: &mut Coordinator| {
                coordinator.surfaces.expire_temporary(serial);
            }),
        );
        self.surfaces.arm_dismissal(serial, handle);
        Ok(Response::Drawn { ts: now_ms() })
    }

    fn observe(&mut self, params: ObserveParams) -> Reply {
        self.require(Permission::InputMonitoring)?;

        let Some(app_id) = params.target_bundle_id.clone() else {
            return self.observe_absolute(&params).map(Some);
        };

        self.require(Permission::Accessibility)?;
        let readiness = self
            .surfaces
            .prepare_target(&app_id, params.activate_app, params.bypass_focus_check)?;
        match readiness {
            Readiness::Ready => self.observe_window(&app_id, &params).map(Some),
            Readiness::Settling(delay) => {
                self.ui.schedule_after(
                    delay,
                    Box::new(move |coordinator: &mut Coordinator| {
                        let reply = coordinator.observe_window(&app_id, &params).map(Some);
                        coordinator.reply(reply);
                    }),
                );
                Ok(None)
            }
        }
    }

    /// Region given in global coordinates
    fn observe_absolute(&mut self, params: &ObserveParams) -> Result<Response, CommandError> {
        let rect = params.rect();
        let show_box = params.show_box.unwrap_or(self.show_observe_box);
        let prepared = if show_box {
            let placement = self.surfaces.place_absolute(rect)?;
            Some(self.surfaces.prepare_persistent(&placement)?)
        } else {
            None
        };

        self.enter(Mode::Observe)?;
        let rect_id = uuid::Uuid::new_v4().to_string();
        self.monitor.add_region(&rect_id, rect);
        if let Some(prepared) = prepared {
            self.show_region_box(&rect_id, prepared)?;
        }
        Ok(Response::Observing { rect_id })
    }

    /// Region centred on a target window, always with a box
    fn observe_window(&mut self, app_id: &str, params: &ObserveParams) -> Result<Response, CommandError> {
        let placement = self.surfaces.place_centered(app_id, params.size())?;
        let prepared = self.surfaces.prepare_persistent(&placement)?;

        self.enter(Mode::Observe)?;
        let rect_id = uuid::Uuid::new_v4().to_string();
        self.monitor.add_region(&rect_id, placement.rect);
        self.show_region_box(&rect_id, prepared)?;
        Ok(Response::Observing { rect_id })
    }

    /// Draws the persistent box for a just-registered region
    ///
    /// If drawing fails the region is dropped again so regions and boxes
    /// stay paired.
    fn show_region_box(&mut self, rect_id: &str, prepared: PreparedAnnotation) -> Result<(), CommandError> {
        if let Err(e) = self.surfaces.show_persistent(rect_id, prepared) {
            self.monitor.remove_region(rect_id);
            return Err(e.into());
        }
        Ok(())
    }

    fn change_mode(&mut self, params: ModeParams) -> Result<Response, CommandError> {
        self.enter(params.mode)?;
        Ok(Response::ModeChanged { mode: self.mode })
    }

    /// Applies the side effects of moving to `target`
    fn enter(&mut self, target: Mode) -> Result<(), CommandError> {
        match StateMachine::transition(self.mode, target) {
            Transition::Stay => {}
            Transition::EnterAct => {
                self.monitor.stop();
                self.monitor.clear_regions();
                self.surfaces.cancel_persistent_all();
                self.mode = Mode::Act;
                tracing::info!("mode: observe -> act");
            }
            Transition::EnterObserve => {
                self.surfaces.clear_all();
                self.mode = Mode::Observe;
                tracing::info!("mode: act -> observe");
            }
        }
        if self.mode == Mode::Observe && !self.monitor.is_active() {
            self.monitor.start()?;
        }
        Ok(())
    }

    fn cancel(&mut self, params: CancelParams) -> Response {
        let had_region = self.monitor.remove_region(&params.rect_id);
        let had_box = self.surfaces.cancel(&params.rect_id);
        Response::Cancelled {
            rect_id: params.rect_id,
            removed: had_region || had_box,
        }
    }

    fn clear(&mut self) -> Response {
        self.surfaces.clear_all();
        self.monitor.clear_regions();
        Response::Cleared
    }

    fn status(&self) -> Response {
        Response::Report {
            mode: self.mode,
            monitoring: self.monitor.is_active(),
            regions: self.monitor.region_count(),
            persistent: self.surfaces.persistent_count(),
            temporary: self.surfaces.has_temporary(),
        }
    }

    /// Tears down every surface and the pointer hook
    pub fn shutdown(&mut self) {
        self.surfaces.clear_all();
        self.monitor.clear_regions();
        self.monitor.stop();
    }
}
