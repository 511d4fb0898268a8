//! The owner of every sensor instance. All pose and configuration changes go through the
//! `Visualizer`, which decides what has to be rebuilt: new ray patterns and display volumes
//! only when the scan configuration changes, throttled rescans on every change.

use crate::errors::ImportError;
use crate::io::document::{RigDocument, SensorRecord};
use crate::io::settings::EngineSettings;
use crate::scene::{IntersectableSurface, Scene, SurfaceSource, SurfaceTag, filter_candidates};
use crate::scheduling::{Clock, SystemClock, Throttle, Trigger};
use crate::sensors::camera::CameraPreview;
use crate::sensors::color::{ColorMode, ColorPolicy, SENSOR_PALETTE};
use crate::sensors::lidar::{ScanPattern, steps_for};
use crate::sensors::pose::SensorPose;
use crate::sensors::raycast::{ScanRequest, ScanStats, build_point_cloud, cast_ranges};
use crate::sensors::{SensorId, SensorKind, SimulatedSensor};
use crate::{Mesh, Point3, PointCloud, UnitVec3};
use std::collections::HashMap;

/// Everything needed to create a sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub name: String,
    pub pose: SensorPose,
    pub kind: SensorKind,
    pub enabled: bool,
    pub show_volume: bool,
    pub show_point_cloud: bool,

    /// Point color, or `None` to take the next one from the palette
    pub color: Option<[u8; 3]>,
    pub color_mode: ColorMode,
}

impl SensorSpec {
    pub fn new(name: &str, pose: SensorPose, kind: SensorKind) -> Self {
        Self {
            name: name.to_string(),
            pose,
            kind,
            enabled: true,
            show_volume: true,
            show_point_cloud: true,
            color: None,
            color_mode: ColorMode::default(),
        }
    }
}

/// A partial change to a sensor. Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorUpdate {
    pub name: Option<String>,
    pub pose: Option<SensorPose>,
    pub enabled: Option<bool>,
    pub show_volume: Option<bool>,
    pub show_point_cloud: Option<bool>,
    pub color: Option<[u8; 3]>,
    pub color_mode: Option<ColorMode>,
    pub kind: Option<SensorKind>,
}

impl SensorUpdate {
    pub fn pose(pose: SensorPose) -> Self {
        Self {
            pose: Some(pose),
            ..Default::default()
        }
    }

    pub fn kind(kind: SensorKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }
}

/// The current, sanitized state of one sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorState {
    pub id: SensorId,
    pub name: String,
    pub pose: SensorPose,
    pub kind: SensorKind,
    pub enabled: bool,
    pub show_volume: bool,
    pub show_point_cloud: bool,
    pub color: [u8; 3],
    pub color_mode: ColorMode,
}

impl SensorState {
    fn color_policy(&self) -> ColorPolicy {
        let (min_range, max_range) = self.kind.as_sensor().range();
        ColorPolicy::new(self.color_mode, self.color, min_range, max_range)
    }

    fn to_record(&self) -> SensorRecord {
        SensorRecord {
            name: self.name.clone(),
            pose: self.pose,
            enabled: self.enabled,
            show_volume: self.show_volume,
            show_point_cloud: self.show_point_cloud,
            color: Some(self.color),
            color_mode: self.color_mode,
            kind: self.kind,
        }
    }
}

/// A sensor's state plus everything derived from it
struct SensorEntry {
    state: SensorState,

    /// Sensor frame ray directions, rebuilt only when the kind or its configuration changes
    rays: Vec<UnitVec3>,

    /// Raster size of a camera's preview, matching `rays`
    preview_size: (usize, usize),

    /// Sensor frame display volume, rebuilt together with `rays`. The scene gets placed copies
    /// of it which share its mesh.
    volume: IntersectableSurface,

    cloud: PointCloud,
    preview: Option<CameraPreview>,
    stats: Option<ScanStats>,
    throttle: Throttle,
    geometry_builds: usize,
}

impl SensorEntry {
    fn new(state: SensorState, settings: &EngineSettings) -> Self {
        let interval = interval_for(&state.kind, settings);
        let tag = SurfaceTag::SensorVisual(state.id);
        let mut entry = Self {
            state,
            rays: Vec::new(),
            preview_size: (0, 0),
            volume: IntersectableSurface::new(tag, Mesh::empty()),
            cloud: PointCloud::empty(),
            preview: None,
            stats: None,
            throttle: Throttle::new(interval),
            geometry_builds: 0,
        };
        entry.rebuild_geometry(settings);
        entry
    }

    fn rebuild_geometry(&mut self, settings: &EngineSettings) {
        let name = &self.state.name;
        match &self.state.kind {
            SensorKind::Lidar(config) => {
                let pattern = ScanPattern::plan(config, settings.ray_budget);
                if pattern.is_degraded() {
                    log::warn!(
                        "sensor '{}': {} rays exceed the budget of {}, horizontal step widened to {:.3} deg",
                        name,
                        config.channels as usize
                            * steps_for(config.horizontal_fov, config.angular_resolution),
                        settings.ray_budget,
                        pattern.effective_resolution()
                    );
                }
                self.rays = pattern.directions();
                self.preview_size = (0, 0);
            }
            SensorKind::Camera(config) => {
                let (w, h, rays) = config.pixel_rays(settings.preview_pixel_budget);
                self.rays = rays;
                self.preview_size = (w, h);
            }
        }

        let mesh = match self.state.kind.as_sensor().volume_mesh(&settings.volume) {
            Ok(mesh) => mesh,
            Err(e) => {
                log::warn!("sensor '{}': failed to build scan volume: {}", name, e);
                Mesh::empty()
            }
        };
        self.volume = IntersectableSurface::new(SurfaceTag::SensorVisual(self.state.id), mesh);
        self.geometry_builds += 1;
    }

    /// Whether a scan cycle should cast anything at all
    fn is_active(&self) -> bool {
        match self.state.kind {
            SensorKind::Lidar(_) => self.state.enabled && self.state.show_point_cloud,
            SensorKind::Camera(_) => self.state.enabled,
        }
    }

    fn clear_outputs(&mut self) {
        self.cloud = PointCloud::empty();
        self.preview = None;
    }

    /// Run one scan cycle against the surfaces the scene holds right now
    fn run_cycle(&mut self, scene: &Scene, settings: &EngineSettings) {
        if !self.is_active() {
            self.clear_outputs();
            return;
        }

        let frame = scene.frame();
        let pose = self.state.pose.to_iso();
        let (min_range, max_range) = self.state.kind.as_sensor().range();
        let request = ScanRequest {
            rays: &self.rays,
            pose: &pose,
            frame,
            min_range,
            max_range,
            color: self.state.color_policy(),
        };

        let world = request.world_pose();
        let position = Point3::from(world.translation.vector);
        let surfaces = scene.surfaces();
        let candidates = filter_candidates(surfaces, &position, max_range, &settings.filter);

        match self.state.kind {
            SensorKind::Lidar(_) => {
                let (cloud, stats) =
                    build_point_cloud(&request, &candidates, settings.parallel_raycast);
                log::debug!(
                    "sensor '{}': {} rays, {} candidates, {} hits in {:?}",
                    self.state.name,
                    stats.rays_cast,
                    stats.candidates,
                    stats.hits,
                    stats.elapsed
                );
                self.cloud = cloud;
                self.stats = Some(stats);
            }
            SensorKind::Camera(_) => {
                let depths = cast_ranges(&request, &candidates, settings.parallel_raycast);
                let (w, h) = self.preview_size;
                match CameraPreview::new(w, h, depths) {
                    Ok(preview) => {
                        log::debug!(
                            "camera '{}': {}x{} preview, {} hits",
                            self.state.name,
                            w,
                            h,
                            preview.hit_count()
                        );
                        self.preview = Some(preview);
                    }
                    Err(e) => {
                        log::warn!("camera '{}': {}", self.state.name, e);
                        self.preview = None;
                    }
                }
            }
        }
    }
}

fn interval_for(kind: &SensorKind, settings: &EngineSettings) -> std::time::Duration {
    match kind {
        SensorKind::Lidar(_) => settings.scan_interval,
        SensorKind::Camera(_) => settings.preview_interval,
    }
}

/// Owns the scene, the engine settings, the clock and every sensor. This is the single entry
/// point for creating, changing and removing sensors, and for reading their outputs.
///
/// Changes never recompute synchronously beyond one immediate run per throttle interval;
/// call `tick` regularly (once per frame) so that deferred runs happen.
pub struct Visualizer {
    scene: Scene,
    settings: EngineSettings,
    clock: Box<dyn Clock>,
    sensors: HashMap<SensorId, SensorEntry>,
    order: Vec<SensorId>,
    next_color: usize,
}

impl Visualizer {
    pub fn new(settings: EngineSettings) -> Self {
        Self::with_clock(settings, Box::new(SystemClock::new()))
    }

    pub fn with_clock(settings: EngineSettings, clock: Box<dyn Clock>) -> Self {
        Self {
            scene: Scene::new(settings.frame),
            settings,
            clock,
            sensors: HashMap::new(),
            order: Vec::new(),
            next_color: 0,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create a sensor and request its first scan
    pub fn add_sensor(&mut self, spec: SensorSpec) -> SensorId {
        let id = SensorId::new();
        let kind = spec.kind.sanitized();
        if kind != spec.kind {
            log::warn!("sensor '{}': configuration clamped to valid ranges", spec.name);
        }

        let color = spec.color.unwrap_or_else(|| {
            let c = SENSOR_PALETTE[self.next_color % SENSOR_PALETTE.len()];
            self.next_color += 1;
            c
        });

        let state = SensorState {
            id,
            name: spec.name,
            pose: spec.pose.sanitized(),
            kind,
            enabled: spec.enabled,
            show_volume: spec.show_volume,
            show_point_cloud: spec.show_point_cloud,
            color,
            color_mode: spec.color_mode,
        };

        log::info!("adding {} sensor '{}' ({})", kind.type_name(), state.name, id);
        let entry = SensorEntry::new(state, &self.settings);
        self.sensors.insert(id, entry);
        self.order.push(id);
        self.place_visual(id);
        self.request_scan(id);
        id
    }

    /// Move a sensor. Only a rescan is requested; its rays and volume are reused.
    pub fn update_pose(&mut self, id: SensorId, pose: SensorPose) -> bool {
        let Some(entry) = self.sensors.get_mut(&id) else {
            log::warn!("update_pose: no sensor with id {}", id);
            return false;
        };

        entry.state.pose = pose.sanitized();
        self.place_visual(id);
        self.request_scan(id);
        true
    }

    /// Apply a partial change to a sensor
    pub fn update_sensor(&mut self, id: SensorId, update: SensorUpdate) -> bool {
        let Some(entry) = self.sensors.get_mut(&id) else {
            log::warn!("update_sensor: no sensor with id {}", id);
            return false;
        };

        let state = &mut entry.state;
        if let Some(name) = update.name {
            state.name = name;
        }
        if let Some(pose) = update.pose {
            state.pose = pose.sanitized();
        }
        if let Some(enabled) = update.enabled {
            state.enabled = enabled;
        }
        if let Some(show) = update.show_volume {
            state.show_volume = show;
        }
        if let Some(show) = update.show_point_cloud {
            state.show_point_cloud = show;
        }
        if let Some(color) = update.color {
            state.color = color;
        }
        if let Some(mode) = update.color_mode {
            state.color_mode = mode;
        }

        if let Some(kind) = update.kind {
            let kind_sanitized = kind.sanitized();
            if kind_sanitized != kind {
                log::warn!("sensor '{}': configuration clamped to valid ranges", state.name);
            }
            if kind_sanitized != state.kind {
                state.kind = kind_sanitized;
                entry
                    .throttle
                    .set_interval(interval_for(&entry.state.kind, &self.settings));
                entry.clear_outputs();
                entry.rebuild_geometry(&self.settings);
            }
        }

        if !entry.is_active() {
            entry.throttle.cancel();
            entry.clear_outputs();
        }

        self.place_visual(id);
        self.request_scan(id);
        true
    }

    /// Turn a sensor on or off. A disabled sensor casts no rays and its outputs are cleared.
    pub fn set_enabled(&mut self, id: SensorId, enabled: bool) -> bool {
        self.update_sensor(
            id,
            SensorUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
    }

    /// Dispose of a sensor. Any pending deferred scan is dropped with it, and its outputs and
    /// display surfaces are released.
    pub fn remove_sensor(&mut self, id: SensorId) -> bool {
        let Some(entry) = self.sensors.remove(&id) else {
            log::warn!("remove_sensor: no sensor with id {}", id);
            return false;
        };

        self.order.retain(|i| *i != id);
        self.scene.remove_tagged(SurfaceTag::SensorVisual(id));
        log::info!("removed sensor '{}' ({})", entry.state.name, id);
        true
    }

    /// Swap the scenario geometry and request a rescan of every sensor
    pub fn replace_scenario(&mut self, meshes: Vec<Mesh>) {
        self.scene.replace_scenario(meshes);
        for id in self.order.clone() {
            self.request_scan(id);
        }
    }

    /// Run every deferred scan which has come due. Returns the number of scans run.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let mut runs = 0;
        for id in &self.order {
            if let Some(entry) = self.sensors.get_mut(id) {
                if entry.throttle.poll(now) {
                    entry.run_cycle(&self.scene, &self.settings);
                    runs += 1;
                }
            }
        }
        runs
    }

    /// Scan immediately, bypassing the throttle and dropping any pending deferred run
    pub fn force_rescan(&mut self, id: SensorId) -> bool {
        let Some(entry) = self.sensors.get_mut(&id) else {
            log::warn!("force_rescan: no sensor with id {}", id);
            return false;
        };

        entry.throttle.cancel();
        entry.run_cycle(&self.scene, &self.settings);
        true
    }

    pub fn sensor(&self, id: SensorId) -> Option<&SensorState> {
        self.sensors.get(&id).map(|e| &e.state)
    }

    /// Sensor ids in the order the sensors were added
    pub fn sensor_ids(&self) -> Vec<SensorId> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The latest point cloud of a LIDAR, in the reference frame
    pub fn point_cloud(&self, id: SensorId) -> Option<&PointCloud> {
        self.sensors.get(&id).map(|e| &e.cloud)
    }

    pub fn camera_preview(&self, id: SensorId) -> Option<&CameraPreview> {
        self.sensors.get(&id).and_then(|e| e.preview.as_ref())
    }

    /// The display volume of a sensor in its own frame
    pub fn scan_volume(&self, id: SensorId) -> Option<&Mesh> {
        self.sensors.get(&id).map(|e| e.volume.mesh())
    }

    pub fn last_scan_stats(&self, id: SensorId) -> Option<ScanStats> {
        self.sensors.get(&id).and_then(|e| e.stats)
    }

    /// Every visible point cloud merged in sensor order
    pub fn combined_point_cloud(&self) -> PointCloud {
        let mut combined = PointCloud::empty();
        for entry in self.order.iter().filter_map(|id| self.sensors.get(id)) {
            if entry.is_active() {
                combined.append(&entry.cloud);
            }
        }
        combined
    }

    /// The number of sensors with a deferred scan waiting for `tick`
    pub fn pending_scans(&self) -> usize {
        self.sensors
            .values()
            .filter(|e| e.throttle.is_pending())
            .count()
    }

    /// Replace the whole rig with the sensors of a JSON rig document. The document is parsed
    /// and validated first; on any error the current rig is left exactly as it was.
    pub fn import_document(&mut self, text: &str) -> Result<Vec<SensorId>, ImportError> {
        let document = RigDocument::from_json(text)?;
        self.apply_document(document)
    }

    /// Replace the whole rig with the sensors of a document. The document is validated before
    /// anything is removed, so a rejected document leaves the current rig in place.
    pub fn apply_document(
        &mut self,
        document: RigDocument,
    ) -> Result<Vec<SensorId>, ImportError> {
        document.validate()?;
        for id in self.order.clone() {
            self.remove_sensor(id);
        }

        let ids = document
            .sensors
            .into_iter()
            .map(|record| self.add_sensor(SensorSpec::from(record)))
            .collect::<Vec<_>>();
        log::info!("imported rig with {} sensors", ids.len());
        Ok(ids)
    }

    pub fn export_document(&self) -> RigDocument {
        RigDocument {
            sensors: self
                .order
                .iter()
                .filter_map(|id| self.sensors.get(id))
                .map(|e| e.state.to_record())
                .collect(),
            ..Default::default()
        }
    }

    /// Put the sensor's display volume into the scene at its current pose, tagged so that no
    /// scan ever hits it. The volume's mesh is shared, only its placement changes.
    fn place_visual(&mut self, id: SensorId) {
        let tag = SurfaceTag::SensorVisual(id);
        self.scene.remove_tagged(tag);

        let Some(entry) = self.sensors.get(&id) else {
            return;
        };
        if !entry.state.show_volume || entry.volume.mesh().is_empty() {
            return;
        }

        let placement = self.scene.frame().to_world() * entry.state.pose.to_iso();
        self.scene
            .insert_auxiliary(entry.volume.placed_at(&placement));
    }

    fn request_scan(&mut self, id: SensorId) {
        let now = self.clock.now();
        let Some(entry) = self.sensors.get_mut(&id) else {
            return;
        };
        if !entry.is_active() {
            return;
        }

        match entry.throttle.trigger(now) {
            Trigger::RunNow => entry.run_cycle(&self.scene, &self.settings),
            Trigger::Deferred(at) => {
                log::trace!("sensor '{}': scan deferred to {:?}", entry.state.name, at)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom3::mesh::box_mesh;
    use crate::scheduling::ManualClock;
    use crate::sensors::{CameraConfig, LidarScanConfig};
    use crate::Iso3;
    use std::time::Duration;

    fn wall(x: f64) -> Mesh {
        box_mesh(Point3::new(x, -20.0, -5.0), Point3::new(x + 0.5, 20.0, 5.0)).unwrap()
    }

    fn small_lidar() -> SensorKind {
        SensorKind::Lidar(LidarScanConfig::new(90.0, 10.0, 4, 1.0, 0.1, 50.0))
    }

    fn setup() -> (Visualizer, ManualClock) {
        let clock = ManualClock::new();
        let mut vis = Visualizer::with_clock(EngineSettings::default(), Box::new(clock.clone()));
        vis.replace_scenario(vec![wall(10.0)]);
        (vis, clock)
    }

    fn lidar_spec(name: &str) -> SensorSpec {
        SensorSpec::new(name, SensorPose::default(), small_lidar())
    }

    #[test]
    fn added_sensor_scans_immediately() {
        let (mut vis, _) = setup();
        let id = vis.add_sensor(lidar_spec("a"));
        let cloud = vis.point_cloud(id).unwrap();
        assert_eq!(cloud.len(), 4 * 90);
        assert!(cloud.points().iter().all(|p| (p.x - 10.0).abs() < 1e-9));
        assert_eq!(vis.pending_scans(), 0);
    }

    #[test]
    fn pose_changes_are_throttled_and_settle_on_last_pose() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(lidar_spec("a"));

        for i in 1..=20 {
            clock.advance(Duration::from_millis(1));
            assert!(vis.update_pose(id, SensorPose::at(i as f64 * 0.1, 0.0, 0.0)));
        }
        assert_eq!(vis.pending_scans(), 1);

        // Still the original pose's cloud
        let first = vis.point_cloud(id).unwrap().points()[0];
        assert!((first.x - 10.0).abs() < 1e-9);

        clock.set(Duration::from_millis(50));
        assert_eq!(vis.tick(), 1);
        assert_eq!(vis.pending_scans(), 0);

        // The wall is at x = 10 regardless of the sensor position
        let cloud = vis.point_cloud(id).unwrap();
        assert_eq!(cloud.len(), 4 * 90);
        assert!(cloud.points().iter().all(|p| (p.x - 10.0).abs() < 1e-9));
        let stats = vis.last_scan_stats(id).unwrap();
        assert_eq!(stats.rays_cast, 4 * 90);
    }

    #[test]
    fn pose_change_reuses_rays_and_volume() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(lidar_spec("a"));
        assert_eq!(vis.sensors[&id].geometry_builds, 1);

        clock.advance(Duration::from_millis(100));
        vis.update_pose(id, SensorPose::new([1.0, 2.0, 0.0], 0.0, 0.0, 10.0));
        assert_eq!(vis.sensors[&id].geometry_builds, 1);

        vis.update_sensor(
            id,
            SensorUpdate::kind(SensorKind::Lidar(LidarScanConfig::vlp16())),
        );
        assert_eq!(vis.sensors[&id].geometry_builds, 2);

        // Same config again is not a change
        vis.update_sensor(
            id,
            SensorUpdate::kind(SensorKind::Lidar(LidarScanConfig::vlp16())),
        );
        assert_eq!(vis.sensors[&id].geometry_builds, 2);
    }

    #[test]
    fn dragging_moves_volume_without_rebuilding_it() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(lidar_spec("a"));

        for i in 1..=200 {
            clock.advance(Duration::from_micros(100));
            vis.update_pose(id, SensorPose::at(i as f64 * 0.01, 0.0, 0.0));
        }
        assert_eq!(vis.sensors[&id].geometry_builds, 1);
        assert_eq!(vis.pending_scans(), 1);

        let visuals = vis
            .scene()
            .surfaces()
            .into_iter()
            .filter(|s| s.tag() == SurfaceTag::SensorVisual(id))
            .collect::<Vec<_>>();
        assert_eq!(visuals.len(), 1);

        let template = &vis.sensors[&id].volume;
        assert!(visuals[0].shares_mesh(template));
        let expected = Iso3::translation(2.0, 0.0, 0.0) * template.center();
        assert!((visuals[0].center() - expected).norm() < 1e-9);
    }

    #[test]
    fn removed_sensor_pending_scan_never_lands() {
        let (mut vis, clock) = setup();
        let a = vis.add_sensor(lidar_spec("a"));
        let b = vis.add_sensor(SensorSpec::new(
            "b",
            SensorPose::at(0.0, 0.0, 1.0),
            small_lidar(),
        ));

        clock.advance(Duration::from_millis(5));
        vis.update_pose(b, SensorPose::at(0.0, 0.0, 2.0));
        assert_eq!(vis.pending_scans(), 1);

        assert!(vis.remove_sensor(b));
        assert_eq!(vis.pending_scans(), 0);

        clock.advance(Duration::from_millis(100));
        assert_eq!(vis.tick(), 0);

        let combined = vis.combined_point_cloud();
        assert_eq!(combined.len(), vis.point_cloud(a).unwrap().len());
        assert!(vis.point_cloud(b).is_none());
        assert_eq!(vis.sensor_ids(), vec![a]);
        assert!(
            vis.scene()
                .surfaces()
                .iter()
                .all(|s| s.tag() != SurfaceTag::SensorVisual(b))
        );
    }

    #[test]
    fn unknown_ids_are_no_ops() {
        let (mut vis, _) = setup();
        let ghost = SensorId::new();
        assert!(!vis.update_pose(ghost, SensorPose::default()));
        assert!(!vis.update_sensor(ghost, SensorUpdate::default()));
        assert!(!vis.set_enabled(ghost, false));
        assert!(!vis.remove_sensor(ghost));
        assert!(!vis.force_rescan(ghost));
        assert!(vis.sensor(ghost).is_none());
        assert!(vis.is_empty());
    }

    #[test]
    fn disabled_sensor_casts_nothing() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(lidar_spec("a"));
        assert!(!vis.point_cloud(id).unwrap().is_empty());

        clock.advance(Duration::from_millis(100));
        assert!(vis.set_enabled(id, false));
        assert!(vis.point_cloud(id).unwrap().is_empty());

        let before = vis.last_scan_stats(id);
        clock.advance(Duration::from_millis(100));
        vis.update_pose(id, SensorPose::at(1.0, 0.0, 0.0));
        vis.force_rescan(id);
        vis.tick();
        assert!(vis.point_cloud(id).unwrap().is_empty());
        assert_eq!(vis.last_scan_stats(id), before);
        assert_eq!(vis.pending_scans(), 0);

        clock.advance(Duration::from_millis(100));
        vis.set_enabled(id, true);
        assert!(!vis.point_cloud(id).unwrap().is_empty());
    }

    #[test]
    fn hidden_point_cloud_short_circuits() {
        let (mut vis, _) = setup();
        let mut spec = lidar_spec("a");
        spec.show_point_cloud = false;
        let id = vis.add_sensor(spec);
        assert!(vis.point_cloud(id).unwrap().is_empty());
        assert!(vis.last_scan_stats(id).is_none());
    }

    #[test]
    fn scenario_swap_triggers_recompute() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(lidar_spec("a"));

        clock.advance(Duration::from_millis(100));
        vis.replace_scenario(vec![wall(5.0)]);
        let cloud = vis.point_cloud(id).unwrap();
        assert!(!cloud.is_empty());
        assert!(cloud.points().iter().all(|p| (p.x - 5.0).abs() < 1e-9));

        clock.advance(Duration::from_millis(100));
        vis.replace_scenario(Vec::new());
        assert!(vis.point_cloud(id).unwrap().is_empty());
    }

    #[test]
    fn sensors_never_hit_volumes() {
        let (mut vis, _) = setup();
        vis.replace_scenario(Vec::new());
        // Two sensors facing each other inside each other's volumes
        let a = vis.add_sensor(lidar_spec("a"));
        let b = vis.add_sensor(SensorSpec::new(
            "b",
            SensorPose::new([5.0, 0.0, 0.0], 0.0, 0.0, 180.0),
            small_lidar(),
        ));
        vis.force_rescan(a);
        vis.force_rescan(b);
        assert!(vis.point_cloud(a).unwrap().is_empty());
        assert!(vis.point_cloud(b).unwrap().is_empty());
        assert_eq!(vis.scene().surfaces().len(), 2);
    }

    #[test]
    fn hiding_volume_removes_visual() {
        let (mut vis, _) = setup();
        let id = vis.add_sensor(lidar_spec("a"));
        assert_eq!(vis.scene().surfaces().len(), 2);
        vis.update_sensor(
            id,
            SensorUpdate {
                show_volume: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(vis.scene().surfaces().len(), 1);
        assert!(!vis.scan_volume(id).unwrap().is_empty());
    }

    #[test]
    fn camera_produces_preview() {
        let (mut vis, _) = setup();
        let camera = CameraConfig {
            preview_width: 8,
            preview_height: 6,
            ..CameraConfig::new(60.0, 40.0, 0.1, 20.0)
        };
        let id = vis.add_sensor(SensorSpec::new(
            "cam",
            SensorPose::default(),
            SensorKind::Camera(camera),
        ));

        let preview = vis.camera_preview(id).unwrap();
        assert_eq!((preview.width(), preview.height()), (8, 6));
        assert_eq!(preview.hit_count(), 48);
        assert!(vis.point_cloud(id).unwrap().is_empty());
        assert_eq!(vis.scan_volume(id).unwrap().faces().len(), 12);
    }

    #[test]
    fn camera_preview_uses_its_own_interval() {
        let (mut vis, clock) = setup();
        let id = vis.add_sensor(SensorSpec::new(
            "cam",
            SensorPose::default(),
            SensorKind::Camera(CameraConfig::default()),
        ));

        clock.set(Duration::from_millis(100));
        vis.update_pose(id, SensorPose::at(1.0, 0.0, 0.0));
        assert_eq!(vis.tick(), 0);
        clock.set(Duration::from_millis(200));
        assert_eq!(vis.tick(), 1);
    }

    #[test]
    fn palette_assigned_in_turn() {
        let (mut vis, _) = setup();
        let a = vis.add_sensor(lidar_spec("a"));
        let b = vis.add_sensor(lidar_spec("b"));
        let mut spec = lidar_spec("c");
        spec.color = Some([9, 9, 9]);
        let c = vis.add_sensor(spec);

        assert_eq!(vis.sensor(a).unwrap().color, SENSOR_PALETTE[0]);
        assert_eq!(vis.sensor(b).unwrap().color, SENSOR_PALETTE[1]);
        assert_eq!(vis.sensor(c).unwrap().color, [9, 9, 9]);
        assert!(
            vis.point_cloud(c)
                .unwrap()
                .colors()
                .iter()
                .all(|c| *c == [9, 9, 9])
        );
    }

    #[test]
    fn invalid_config_is_clamped() {
        let (mut vis, _) = setup();
        let id = vis.add_sensor(SensorSpec::new(
            "bad",
            SensorPose::default(),
            SensorKind::Lidar(LidarScanConfig::new(f64::NAN, 10.0, 0, -1.0, 5.0, 2.0)),
        ));
        let SensorKind::Lidar(config) = vis.sensor(id).unwrap().kind else {
            panic!("expected lidar");
        };
        assert!(config.is_valid());
        assert!(config.max_range > config.min_range);
    }

    #[test]
    fn import_replaces_rig_and_defaults_channels() {
        let (mut vis, _) = setup();
        vis.add_sensor(lidar_spec("old"));

        let ids = vis
            .import_document(
                r#"{"version": 1, "sensors": [
                    {"name": "roof", "type": "lidar", "pose": {"position": [0, 0, 0]},
                     "horizontal_fov": 90, "angular_resolution": 1.0}
                ]}"#,
            )
            .unwrap();

        assert_eq!(ids.len(), 1);
        assert_eq!(vis.sensor_ids(), ids);
        let state = vis.sensor(ids[0]).unwrap();
        assert_eq!(state.name, "roof");
        let SensorKind::Lidar(config) = state.kind else {
            panic!("expected lidar");
        };
        assert_eq!(config.channels, 16);
        assert_eq!(vis.point_cloud(ids[0]).unwrap().len(), 16 * 90);
    }

    #[test]
    fn malformed_import_leaves_rig_untouched() {
        let (mut vis, _) = setup();
        let id = vis.add_sensor(lidar_spec("keep"));
        let before = vis.export_document();

        let bad = r#"{"version": 1, "sensors": [
            {"name": "ok", "type": "lidar", "pose": {"position": [0, 0, 0]}},
            {"type": "lidar", "pose": {"position": [0, 0, 0]}}
        ]}"#;
        assert!(vis.import_document(bad).is_err());
        assert!(vis.import_document("not json").is_err());
        assert!(
            vis.import_document(r#"{"version": 2, "sensors": []}"#)
                .is_err()
        );

        assert_eq!(vis.sensor_ids(), vec![id]);
        assert_eq!(vis.export_document(), before);
    }

    #[test]
    fn unvalidated_document_is_rejected_whole() {
        let (mut vis, _) = setup();
        let id = vis.add_sensor(lidar_spec("keep"));

        let mut future = vis.export_document();
        future.version = 7;
        assert!(matches!(
            vis.apply_document(future),
            Err(ImportError::UnsupportedVersion { found: 7, .. })
        ));

        let mut unnamed = vis.export_document();
        unnamed.sensors.push(SensorRecord::from(lidar_spec("")));
        assert!(matches!(
            vis.apply_document(unnamed),
            Err(ImportError::EmptyName { index: 1 })
        ));

        assert_eq!(vis.sensor_ids(), vec![id]);
    }

    #[test]
    fn export_import_round_trip() {
        let (mut vis, _) = setup();
        vis.add_sensor(SensorSpec::new(
            "roof",
            SensorPose::new([0.0, 0.0, 1.8], 0.0, 5.0, 90.0),
            SensorKind::Lidar(LidarScanConfig::vlp16()),
        ));
        vis.add_sensor(SensorSpec::new(
            "cam",
            SensorPose::at(1.0, 0.0, 1.0),
            SensorKind::Camera(CameraConfig::default()),
        ));

        let doc = vis.export_document();
        let text = doc.to_json().unwrap();

        let (mut other, _) = setup();
        other.import_document(&text).unwrap();
        assert_eq!(other.export_document(), doc);
    }

    #[test]
    fn gradient_mode_colors_by_distance() {
        let (mut vis, _) = setup();
        let mut spec = lidar_spec("a");
        spec.color_mode = ColorMode::DistanceGradient;
        let id = vis.add_sensor(spec);
        let colors = vis.point_cloud(id).unwrap().colors();
        assert!(colors.iter().all(|c| c[2] == 0 && c[0] > 0 && c[1] > 0));
    }
}
