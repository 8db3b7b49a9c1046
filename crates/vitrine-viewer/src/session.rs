use glam::Vec3;

use crate::color::{ColorMemory, DEFAULT_TINT, Rgb};
use crate::error::ViewerError;
use crate::registry::ModelRegistry;
use crate::stage::{FALLBACK_CAMERA_DISTANCE, FRAMING_FACTOR, SceneStage};

/// Identity of one accepted `select_model` call. Tokens grow monotonically;
/// the session honors completions only for the latest one it issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// A load the caller must hand to the asset loader. The session never
/// performs the load itself and never blocks on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub token: RequestToken,
    pub name: String,
    pub locator: String,
}

/// What a load completion did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Displayed,
    Fallback,
    /// The completion belonged to a superseded request and was dropped.
    Stale,
}

/// Externally visible state, derived from the displayed content and the
/// pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState<'a> {
    Idle,
    Loading { target: &'a str },
    Displayed { name: &'a str },
    Fallback,
}

/// Fired after every successful load and every explicit color change.
/// `name` is `None` when the fallback solid is being tinted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChanged {
    pub name: Option<String>,
    pub color: Rgb,
}

#[derive(Debug, PartialEq, Eq)]
enum Attached {
    None,
    Model(String),
    Fallback,
}

#[derive(Debug)]
struct PendingLoad {
    token: RequestToken,
    name: String,
}

/// The live viewer session: owns the registry, the color memory, and the
/// model-switching state machine.
///
/// Commands come in from the panels; scene mutation goes out through a
/// [`SceneStage`]; load work goes out as [`LoadRequest`]s and comes back
/// through [`ViewerSession::finish_load`].
pub struct ViewerSession {
    registry: ModelRegistry,
    colors: ColorMemory,
    attached: Attached,
    pending: Option<PendingLoad>,
    next_request: u64,
    current_color: Rgb,
    progress: Option<f32>,
    subscribers: Vec<Box<dyn FnMut(&ModelChanged)>>,
}

impl ViewerSession {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            colors: ColorMemory::new(),
            attached: Attached::None,
            pending: None,
            next_request: 0,
            current_color: DEFAULT_TINT,
            progress: None,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> ViewerState<'_> {
        if let Some(pending) = &self.pending {
            return ViewerState::Loading {
                target: &pending.name,
            };
        }
        match &self.attached {
            Attached::None => ViewerState::Idle,
            Attached::Model(name) => ViewerState::Displayed { name },
            Attached::Fallback => ViewerState::Fallback,
        }
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.registry.names()
    }

    pub fn locator(&self, name: &str) -> Option<&str> {
        self.registry.locator(name)
    }

    pub fn displayed_model(&self) -> Option<&str> {
        match &self.attached {
            Attached::Model(name) => Some(name),
            _ => None,
        }
    }

    pub fn current_color(&self) -> Rgb {
        self.current_color
    }

    pub fn remembered_color(&self, name: &str) -> Option<Rgb> {
        self.colors.get(name)
    }

    /// Progress of the pending load, if the loader has reported any.
    pub fn load_progress(&self) -> Option<f32> {
        self.progress
    }

    /// Register a change listener. All subscribers see every notification.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&ModelChanged) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Ask to display `name`.
    ///
    /// Returns `Ok(None)` when the selection is already satisfied (the model
    /// is displayed, or a load for it is pending). Otherwise the displayed
    /// model's tint is persisted, any in-flight request is superseded, and
    /// the returned [`LoadRequest`] must be handed to the loader.
    pub fn select_model(&mut self, name: &str) -> Result<Option<LoadRequest>, ViewerError> {
        let locator = self
            .registry
            .locator(name)
            .ok_or_else(|| ViewerError::UnknownModel(name.to_string()))?
            .to_string();

        if let Some(pending) = &self.pending {
            if pending.name == name {
                return Ok(None);
            }
        } else if matches!(&self.attached, Attached::Model(current) if current == name) {
            return Ok(None);
        }

        // Persist-before-switch: whatever tint the displayed model carries
        // right now is what it comes back with later.
        if let Attached::Model(current) = &self.attached {
            self.colors.remember(current, self.current_color);
        }

        self.next_request += 1;
        let token = RequestToken(self.next_request);
        self.pending = Some(PendingLoad {
            token,
            name: name.to_string(),
        });
        self.progress = Some(0.0);
        log::info!("loading model \"{name}\" from {locator}");

        Ok(Some(LoadRequest {
            token,
            name: name.to_string(),
            locator,
        }))
    }

    /// Feed a loader progress report. Reports from superseded requests are
    /// ignored.
    pub fn report_progress(&mut self, token: RequestToken, fraction: f32) {
        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            self.progress = Some(fraction.clamp(0.0, 1.0));
        }
    }

    /// Apply a load completion.
    ///
    /// Only the latest issued request may mutate the session; anything else
    /// is discarded (its subtree, if any, is released by drop). On success
    /// the new subtree replaces the old one, the remembered tint is applied,
    /// and the camera is reframed. On failure the fallback solid goes up
    /// instead and the error stops here.
    pub fn finish_load<S: SceneStage>(
        &mut self,
        stage: &mut S,
        token: RequestToken,
        result: Result<S::Subtree, ViewerError>,
    ) -> LoadOutcome {
        let Some(pending) = self.pending.take_if(|p| p.token == token) else {
            log::debug!("discarding stale load completion");
            return LoadOutcome::Stale;
        };
        self.progress = None;

        match result {
            Ok(subtree) => {
                let _released = stage.attach(subtree);
                let color = self.colors.resolve(&pending.name);
                self.colors.remember(&pending.name, color);
                self.current_color = color;
                stage.apply_tint(color);
                match stage.bounds() {
                    Some(bounds) if bounds.diagonal > f32::EPSILON => {
                        stage.frame_camera(bounds.center, bounds.diagonal * FRAMING_FACTOR);
                    }
                    _ => stage.frame_camera(Vec3::ZERO, FALLBACK_CAMERA_DISTANCE),
                }
                stage.reset_interaction();
                self.attached = Attached::Model(pending.name.clone());
                self.notify(&ModelChanged {
                    name: Some(pending.name),
                    color,
                });
                LoadOutcome::Displayed
            }
            Err(err) => {
                log::error!("failed to load model \"{}\": {err}", pending.name);
                let _released = stage.attach_fallback();
                stage.frame_camera(Vec3::ZERO, FALLBACK_CAMERA_DISTANCE);
                stage.reset_interaction();
                self.attached = Attached::Fallback;
                LoadOutcome::Fallback
            }
        }
    }

    /// Tint every colorable surface of the current subtree and remember the
    /// choice for the displayed model. With nothing attached, only the
    /// session's current color is recorded.
    pub fn set_color<S: SceneStage>(&mut self, stage: &mut S, color: Rgb) {
        self.current_color = color;
        let name = match &self.attached {
            Attached::Model(name) => {
                self.colors.remember(name, color);
                Some(name.clone())
            }
            Attached::Fallback => None,
            Attached::None => return,
        };
        stage.apply_tint(color);
        self.notify(&ModelChanged { name, color });
    }

    /// Register a model; it becomes selectable immediately.
    pub fn add_model(&mut self, name: &str, locator: &str) -> Result<(), ViewerError> {
        self.registry.add(name, locator)?;
        log::info!("registered model \"{name}\" at {locator}");
        Ok(())
    }

    /// Remove a model and its color memory.
    ///
    /// Removing the pending target invalidates the in-flight request (its
    /// completion turns stale). Removing the displayed model auto-selects
    /// the first remaining entry and returns its load request; with an empty
    /// registry the subtree is detached and the session goes idle.
    pub fn remove_model<S: SceneStage>(
        &mut self,
        stage: &mut S,
        name: &str,
    ) -> Result<Option<LoadRequest>, ViewerError> {
        self.registry.remove(name)?;
        self.colors.forget(name);
        log::info!("removed model \"{name}\" from the registry");

        if self.pending.as_ref().is_some_and(|p| p.name == name) {
            self.pending = None;
            self.progress = None;
        }

        if !matches!(&self.attached, Attached::Model(current) if current == name) {
            return Ok(None);
        }

        match self.registry.first_name().map(str::to_string) {
            Some(next) => {
                // The removed subtree stays visible until its replacement
                // lands; the session just no longer claims it.
                self.attached = Attached::None;
                self.select_model(&next)
            }
            None => {
                let _released = stage.detach();
                self.attached = Attached::None;
                Ok(None)
            }
        }
    }

    fn notify(&mut self, event: &ModelChanged) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for subscriber in &mut subscribers {
            subscriber(event);
        }
        self.subscribers = subscribers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::SceneBounds;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FALLBACK_ID: &str = "<fallback>";

    /// Scene stage double: a single attachment slot plus call recording.
    struct MockStage {
        attached: Option<String>,
        released: Vec<String>,
        tints: Vec<Rgb>,
        framings: Vec<(Vec3, f32)>,
        interaction_resets: usize,
        bounds: Option<SceneBounds>,
    }

    impl MockStage {
        fn new() -> Self {
            Self {
                attached: None,
                released: Vec::new(),
                tints: Vec::new(),
                framings: Vec::new(),
                interaction_resets: 0,
                bounds: Some(SceneBounds {
                    center: Vec3::new(1.0, 2.0, 3.0),
                    diagonal: 4.0,
                }),
            }
        }

        fn swap(&mut self, subtree: Option<String>) -> Option<String> {
            let previous = std::mem::replace(&mut self.attached, subtree);
            if let Some(prev) = &previous {
                self.released.push(prev.clone());
            }
            previous
        }
    }

    impl SceneStage for MockStage {
        type Subtree = String;

        fn attach(&mut self, subtree: String) -> Option<String> {
            self.swap(Some(subtree))
        }

        fn detach(&mut self) -> Option<String> {
            self.swap(None)
        }

        fn attach_fallback(&mut self) -> Option<String> {
            self.swap(Some(FALLBACK_ID.to_string()))
        }

        fn bounds(&self) -> Option<SceneBounds> {
            self.attached.as_ref().and_then(|_| self.bounds)
        }

        fn apply_tint(&mut self, color: Rgb) {
            self.tints.push(color);
        }

        fn frame_camera(&mut self, center: Vec3, distance: f32) {
            self.framings.push((center, distance));
        }

        fn reset_interaction(&mut self) {
            self.interaction_resets += 1;
        }
    }

    fn session() -> ViewerSession {
        ViewerSession::new(ModelRegistry::seeded([
            ("Chair".to_string(), "assets/models/chair.glb".to_string()),
            ("Lamp".to_string(), "assets/models/lamp.glb".to_string()),
            ("Table".to_string(), "assets/models/table.glb".to_string()),
        ]))
    }

    fn notifications(session: &mut ViewerSession) -> Rc<RefCell<Vec<ModelChanged>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        seen
    }

    /// Issue a selection and drive its load to success.
    fn show(session: &mut ViewerSession, stage: &mut MockStage, name: &str) {
        let request = session.select_model(name).unwrap().unwrap();
        let outcome = session.finish_load(stage, request.token, Ok(format!("subtree:{name}")));
        assert_eq!(outcome, LoadOutcome::Displayed);
    }

    #[test]
    fn selection_loads_attaches_and_notifies() {
        let mut session = session();
        let mut stage = MockStage::new();
        let seen = notifications(&mut session);

        let request = session.select_model("Chair").unwrap().unwrap();
        assert_eq!(request.name, "Chair");
        assert_eq!(request.locator, "assets/models/chair.glb");
        assert_eq!(session.state(), ViewerState::Loading { target: "Chair" });

        let outcome = session.finish_load(&mut stage, request.token, Ok("subtree:Chair".into()));
        assert_eq!(outcome, LoadOutcome::Displayed);
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
        assert_eq!(stage.attached.as_deref(), Some("subtree:Chair"));
        assert_eq!(
            *seen.borrow(),
            [ModelChanged {
                name: Some("Chair".into()),
                color: DEFAULT_TINT,
            }]
        );
    }

    #[test]
    fn reselecting_the_displayed_model_is_a_noop() {
        let mut session = session();
        let mut stage = MockStage::new();
        let seen = notifications(&mut session);

        show(&mut session, &mut stage, "Chair");
        assert_eq!(seen.borrow().len(), 1);

        // No new request, no extra notification.
        assert_eq!(session.select_model("Chair").unwrap(), None);
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
    }

    #[test]
    fn reselecting_the_pending_target_is_a_noop() {
        let mut session = session();

        let first = session.select_model("Chair").unwrap();
        assert!(first.is_some());
        assert_eq!(session.select_model("Chair").unwrap(), None);
    }

    #[test]
    fn color_memory_survives_model_switches() {
        let mut session = session();
        let mut stage = MockStage::new();
        let c1 = Rgb::new(0x112233);
        let c2 = Rgb::new(0x445566);

        show(&mut session, &mut stage, "Chair");
        session.set_color(&mut stage, c1);
        show(&mut session, &mut stage, "Lamp");
        session.set_color(&mut stage, c2);
        show(&mut session, &mut stage, "Chair");

        assert_eq!(session.current_color(), c1);
        assert_eq!(stage.tints.last(), Some(&c1));
        assert_eq!(session.remembered_color("Lamp"), Some(c2));
    }

    #[test]
    fn tint_is_persisted_even_without_an_explicit_color_change() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        // Switching away records the (default) tint under "Chair".
        let request = session.select_model("Lamp").unwrap().unwrap();
        assert_eq!(session.remembered_color("Chair"), Some(DEFAULT_TINT));
        session.finish_load(&mut stage, request.token, Ok("subtree:Lamp".into()));
    }

    #[test]
    fn superseded_load_completion_is_discarded() {
        let mut session = session();
        let mut stage = MockStage::new();
        let c2 = Rgb::new(0x775511);

        let slow = session.select_model("Chair").unwrap().unwrap();
        let fast = session.select_model("Lamp").unwrap().unwrap();

        // The later selection resolves first and wins.
        session.finish_load(&mut stage, fast.token, Ok("subtree:Lamp".into()));
        session.set_color(&mut stage, c2);

        // The slow completion arrives afterwards and must change nothing.
        let outcome = session.finish_load(&mut stage, slow.token, Ok("subtree:Chair".into()));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(session.state(), ViewerState::Displayed { name: "Lamp" });
        assert_eq!(stage.attached.as_deref(), Some("subtree:Lamp"));
        assert_eq!(session.current_color(), c2);
    }

    #[test]
    fn failed_load_attaches_the_fallback_solid() {
        let mut session = session();
        let mut stage = MockStage::new();
        let seen = notifications(&mut session);

        show(&mut session, &mut stage, "Chair");
        let request = session.select_model("Lamp").unwrap().unwrap();
        let outcome = session.finish_load(
            &mut stage,
            request.token,
            Err(ViewerError::LoadFailure("corrupt file".into())),
        );

        assert_eq!(outcome, LoadOutcome::Fallback);
        assert_eq!(session.state(), ViewerState::Fallback);
        // Exactly one subtree attached, the prior one released. No
        // notification for a fallback transition.
        assert_eq!(stage.attached.as_deref(), Some(FALLBACK_ID));
        assert_eq!(stage.released, ["subtree:Chair"]);
        assert_eq!(seen.borrow().len(), 1);
        // Fixed framing, not bounds-derived.
        assert_eq!(stage.framings.last(), Some(&(Vec3::ZERO, FALLBACK_CAMERA_DISTANCE)));
    }

    #[test]
    fn unknown_model_selection_is_rejected_untouched() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        let tints_before = stage.tints.len();

        let err = session.select_model("NoSuchModel").unwrap_err();
        assert!(matches!(err, ViewerError::UnknownModel(name) if name == "NoSuchModel"));
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
        assert_eq!(session.remembered_color("NoSuchModel"), None);
        assert_eq!(stage.tints.len(), tints_before);
    }

    #[test]
    fn first_display_applies_and_records_the_default_tint() {
        let mut session = session();
        let mut stage = MockStage::new();

        assert_eq!(session.remembered_color("Chair"), None);
        show(&mut session, &mut stage, "Chair");

        assert_eq!(session.current_color(), DEFAULT_TINT);
        assert_eq!(stage.tints, [DEFAULT_TINT]);
        assert_eq!(session.remembered_color("Chair"), Some(DEFAULT_TINT));
    }

    #[test]
    fn successful_load_frames_camera_from_bounds() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        assert_eq!(
            stage.framings,
            [(Vec3::new(1.0, 2.0, 3.0), 4.0 * FRAMING_FACTOR)]
        );
        assert_eq!(stage.interaction_resets, 1);
    }

    #[test]
    fn degenerate_bounds_fall_back_to_the_default_distance() {
        let mut session = session();
        let mut stage = MockStage::new();
        stage.bounds = Some(SceneBounds {
            center: Vec3::ZERO,
            diagonal: 0.0,
        });

        show(&mut session, &mut stage, "Chair");
        assert_eq!(stage.framings, [(Vec3::ZERO, FALLBACK_CAMERA_DISTANCE)]);
    }

    #[test]
    fn set_color_with_nothing_attached_only_records() {
        let mut session = session();
        let mut stage = MockStage::new();
        let seen = notifications(&mut session);
        let color = Rgb::new(0xabcdef);

        session.set_color(&mut stage, color);
        assert_eq!(session.current_color(), color);
        assert!(stage.tints.is_empty());
        assert!(seen.borrow().is_empty());

        // The first load still resolves from color memory, so the default
        // tint wins over the pre-load choice.
        show(&mut session, &mut stage, "Chair");
        assert_eq!(session.current_color(), DEFAULT_TINT);
    }

    #[test]
    fn tinting_the_fallback_does_not_write_color_memory() {
        let mut session = session();
        let mut stage = MockStage::new();

        let request = session.select_model("Chair").unwrap().unwrap();
        session.finish_load(
            &mut stage,
            request.token,
            Err(ViewerError::LoadFailure("missing".into())),
        );

        session.set_color(&mut stage, Rgb::new(0x123456));
        assert_eq!(stage.tints, [Rgb::new(0x123456)]);
        assert_eq!(session.remembered_color("Chair"), None);
    }

    #[test]
    fn selecting_the_displayed_model_supersedes_a_pending_load() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        let lamp = session.select_model("Lamp").unwrap().unwrap();
        // Latest intent wins: going back to Chair issues a fresh request.
        let chair = session.select_model("Chair").unwrap().unwrap();

        session.finish_load(&mut stage, chair.token, Ok("subtree:Chair#2".into()));
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });

        let outcome = session.finish_load(&mut stage, lamp.token, Ok("subtree:Lamp".into()));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(stage.attached.as_deref(), Some("subtree:Chair#2"));
    }

    #[test]
    fn progress_reports_track_only_the_pending_request() {
        let mut session = session();

        let slow = session.select_model("Chair").unwrap().unwrap();
        session.report_progress(slow.token, 0.25);
        assert_eq!(session.load_progress(), Some(0.25));

        let fast = session.select_model("Lamp").unwrap().unwrap();
        session.report_progress(slow.token, 0.5);
        assert_eq!(session.load_progress(), Some(0.0));
        session.report_progress(fast.token, 0.75);
        assert_eq!(session.load_progress(), Some(0.75));
    }

    #[test]
    fn every_subscriber_sees_every_notification() {
        let mut session = session();
        let mut stage = MockStage::new();
        let first = notifications(&mut session);
        let second = notifications(&mut session);

        show(&mut session, &mut stage, "Chair");
        session.set_color(&mut stage, Rgb::new(0x101010));

        assert_eq!(first.borrow().len(), 2);
        assert_eq!(*first.borrow(), *second.borrow());
    }

    #[test]
    fn removing_the_displayed_model_selects_the_next_entry() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Lamp");
        session.set_color(&mut stage, Rgb::new(0x808080));

        let request = session.remove_model(&mut stage, "Lamp").unwrap().unwrap();
        assert_eq!(request.name, "Chair");
        assert_eq!(session.state(), ViewerState::Loading { target: "Chair" });
        // The removed model's color memory went with it.
        assert_eq!(session.remembered_color("Lamp"), None);

        session.finish_load(&mut stage, request.token, Ok("subtree:Chair".into()));
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
    }

    #[test]
    fn removing_the_last_model_clears_the_viewer() {
        let mut session = ViewerSession::new(ModelRegistry::seeded([(
            "Chair".to_string(),
            "assets/models/chair.glb".to_string(),
        )]));
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        let request = session.remove_model(&mut stage, "Chair").unwrap();
        assert_eq!(request, None);
        assert_eq!(session.state(), ViewerState::Idle);
        assert_eq!(stage.attached, None);
        assert_eq!(stage.released, ["subtree:Chair"]);
    }

    #[test]
    fn removing_the_pending_target_invalidates_the_load() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        let request = session.select_model("Lamp").unwrap().unwrap();
        assert_eq!(session.remove_model(&mut stage, "Lamp").unwrap(), None);

        // Still showing Chair; the in-flight completion is now stale.
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
        let outcome = session.finish_load(&mut stage, request.token, Ok("subtree:Lamp".into()));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(stage.attached.as_deref(), Some("subtree:Chair"));
    }

    #[test]
    fn removing_an_undisplayed_model_leaves_the_stage_alone() {
        let mut session = session();
        let mut stage = MockStage::new();

        show(&mut session, &mut stage, "Chair");
        assert_eq!(session.remove_model(&mut stage, "Table").unwrap(), None);
        assert_eq!(session.state(), ViewerState::Displayed { name: "Chair" });
        assert_eq!(stage.released, Vec::<String>::new());
    }

    #[test]
    fn added_model_is_immediately_selectable() {
        let mut session = session();

        session.add_model("Vase", "assets/models/vase.glb").unwrap();
        let names: Vec<_> = session.model_names().collect();
        assert_eq!(names, ["Chair", "Lamp", "Table", "Vase"]);

        let request = session.select_model("Vase").unwrap().unwrap();
        assert_eq!(request.locator, "assets/models/vase.glb");
    }
}
