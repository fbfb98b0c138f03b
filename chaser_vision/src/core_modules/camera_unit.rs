// THEORY:
// A `CameraDecisionUnit` is the per-camera brain. It owns one physical camera (through
// a `FrameSource`), knows how that camera is mounted (its `CameraRole`), and turns a
// frame into exactly one motion `Command` plus the intermediate mask for display.
//
// Key architectural principles:
// 1.  **Role-Driven Rules**: The same pixels mean different things to a front camera
//     and a side camera. The role is fixed at construction and selects the rule set;
//     nothing else about the unit changes between cycles.
// 2.  **Stateless Across Cycles**: A unit keeps no memory of previous frames. All
//     temporal behaviour (search, resend) belongs to the `Arbiter`.
// 3.  **Pure Rule Functions**: Each rule set is a free function over already-extracted
//     observations (grid cells, band hits, obstacle columns). The unit methods only
//     run the perception stages and hand the results to those functions, which keeps
//     the rules testable without frames.
// 4.  **Explicit Ambiguity**: The avoid-object rule can have no sensible answer. It
//     returns a `DecisionError` rather than guessing a direction.

use crate::capture::{Frame, FrameSource};
use crate::core_modules::blob_locator::{BlobLocator, MultiCentroidLocator};
use crate::core_modules::color_segmenter::{ColorRange, ColorSegmenter, Mask};
use crate::core_modules::command::Command;
use crate::core_modules::grid_mapper::{GridCell, GridMapper};
use crate::error::{CaptureError, DecisionError};
use serde::Deserialize;
use std::fmt;
use tracing::debug;

/// Lowest centroid row (in pixels) that counts as a line under the robot.
pub const DEFAULT_LINE_MIN_Y: u32 = 715;

/// The fixed mounting orientation of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraRole {
    Front,
    Back,
    Left,
    Right,
}

impl fmt::Display for CameraRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CameraRole::Front => "front",
            CameraRole::Back => "back",
            CameraRole::Left => "left",
            CameraRole::Right => "right",
        };
        f.write_str(name)
    }
}

/// Which rule set to apply to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMode {
    Chase,
    FaceObject,
    AvoidLine,
    AvoidObject,
}

/// The grid coordinate the chase rule averages to steer the front and back cameras.
///
/// This reads the row, not the column, so the "steering" average is vertical.
/// Switching the rule to horizontal steering is a change to this one function.
pub fn steering_axis(cell: &GridCell) -> u8 {
    cell.row
}

/// The chase rule set. First match wins.
pub fn chase_rule(role: CameraRole, cells: &[GridCell]) -> Command {
    // Nothing in view: the front camera defers to the arbiter's search, and the
    // other roles have no average to steer by.
    if cells.is_empty() {
        return Command::Noop;
    }
    match role {
        CameraRole::Right => return Command::TurnRight,
        CameraRole::Left => return Command::TurnLeft,
        _ => {}
    }

    let total: f64 = cells.iter().map(|cell| steering_axis(cell) as f64).sum();
    let average = total / cells.len() as f64;
    match role {
        CameraRole::Back if average < 2.0 => Command::TurnRight,
        CameraRole::Back => Command::TurnLeft,
        CameraRole::Front if average > 1.0 && average < 3.0 => Command::Forward,
        CameraRole::Front if average <= 1.0 => Command::TurnRight,
        CameraRole::Front => Command::TurnLeft,
        CameraRole::Left | CameraRole::Right => Command::Noop,
    }
}

/// Chase, except that driving forward becomes a hold-and-realign.
pub fn face_object_rule(role: CameraRole, cells: &[GridCell]) -> Command {
    match chase_rule(role, cells) {
        Command::Forward => Command::Align,
        other => other,
    }
}

/// The fixed avoidance response once any line centroid sits in the danger band.
pub fn avoid_line_rule(role: CameraRole, line_in_band: bool) -> Command {
    if !line_in_band {
        return Command::Noop;
    }
    match role {
        CameraRole::Front => Command::Stop,
        CameraRole::Back => Command::Forward,
        CameraRole::Left => Command::TurnRight,
        CameraRole::Right => Command::TurnLeft,
    }
}

/// Steers away from the most common obstacle column within columns 1..=3.
pub fn avoid_object_rule(columns: &[u8]) -> Result<Command, DecisionError> {
    let mut counts = [0usize; 5];
    let mut observed = 0usize;
    for &column in columns.iter().filter(|&&c| (1..=3).contains(&c)) {
        counts[column as usize] += 1;
        observed += 1;
    }
    if observed == 0 {
        return Err(DecisionError::NoObservations);
    }

    let best = counts.iter().copied().max().unwrap_or(0);
    let candidates: Vec<u8> = (1..=3u8).filter(|&c| counts[c as usize] == best).collect();
    if candidates.len() > 1 {
        return Err(DecisionError::AmbiguousMode { candidates });
    }

    match candidates[0] {
        3 => Ok(Command::TurnRight),
        1 => Ok(Command::TurnLeft),
        column => Err(DecisionError::UnsteerableColumn { column }),
    }
}

/// One camera plus the perception stages and rule sets that interpret it.
pub struct CameraDecisionUnit {
    name: String,
    role: CameraRole,
    source: Box<dyn FrameSource>,
    segmenter: ColorSegmenter,
    /// Locator feeding the chase rule.
    locator: Box<dyn BlobLocator>,
    /// The avoidance rules always look at individual contours.
    contours: MultiCentroidLocator,
    mapper: GridMapper,
    line_min_y: u32,
}

impl CameraDecisionUnit {
    pub fn new(
        name: impl Into<String>,
        role: CameraRole,
        source: Box<dyn FrameSource>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            source,
            segmenter: ColorSegmenter::new(),
            locator: Box::new(MultiCentroidLocator::default()),
            contours: MultiCentroidLocator::default(),
            mapper: GridMapper::new(width, height),
            line_min_y: DEFAULT_LINE_MIN_Y,
        }
    }

    /// Replaces the locator used by the chase and face-object rules.
    pub fn with_locator(mut self, locator: Box<dyn BlobLocator>) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_line_min_y(mut self, line_min_y: u32) -> Self {
        self.line_min_y = line_min_y;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> CameraRole {
        self.role
    }

    /// Reads one frame and checks it against the configured geometry.
    pub fn capture(&mut self) -> Result<Frame, CaptureError> {
        let frame = self.source.get_frame()?;
        if frame.width() != self.mapper.width() || frame.height() != self.mapper.height() {
            return Err(CaptureError::DimensionMismatch {
                camera: self.name.clone(),
                expected_width: self.mapper.width(),
                expected_height: self.mapper.height(),
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        Ok(frame)
    }

    /// Captures a frame and runs the chase rule set on it.
    pub fn decide(&mut self, range: &ColorRange) -> Result<(Mask, Command), CaptureError> {
        let frame = self.capture()?;
        Ok(self.chase(&frame, range))
    }

    /// Runs one rule set against an already captured frame.
    pub fn decide_frame(
        &self,
        frame: &Frame,
        mode: DecisionMode,
        range: &ColorRange,
    ) -> Result<(Mask, Command), DecisionError> {
        match mode {
            DecisionMode::Chase => Ok(self.chase(frame, range)),
            DecisionMode::FaceObject => Ok(self.face_object(frame, range)),
            DecisionMode::AvoidLine => Ok(self.avoid_line(frame, range)),
            DecisionMode::AvoidObject => {
                let (mask, decision) = self.avoid_object(frame, range);
                decision.map(|command| (mask, command))
            }
        }
    }

    /// The grid cells occupied by `range` in `frame`, with the mask they came from.
    pub fn locate_cells(&self, frame: &Frame, range: &ColorRange) -> (Mask, Vec<GridCell>) {
        let mask = self.segmenter.segment(frame, range);
        let centroids = self.locator.locate(&mask);
        let cells = self.mapper.quantize_located(&centroids);
        (mask, cells)
    }

    pub fn chase(&self, frame: &Frame, range: &ColorRange) -> (Mask, Command) {
        let (mask, cells) = self.locate_cells(frame, range);
        let command = chase_rule(self.role, &cells);
        debug!(camera = %self.name, role = %self.role, ?cells, %command, "chase");
        (mask, command)
    }

    pub fn face_object(&self, frame: &Frame, range: &ColorRange) -> (Mask, Command) {
        let (mask, cells) = self.locate_cells(frame, range);
        let command = face_object_rule(self.role, &cells);
        debug!(camera = %self.name, role = %self.role, ?cells, %command, "face object");
        (mask, command)
    }

    pub fn avoid_line(&self, frame: &Frame, range: &ColorRange) -> (Mask, Command) {
        let mask = self.segmenter.segment(frame, range);
        let width = self.mapper.width() as f64;
        let in_band = self.contours.locate(&mask).iter().any(|c| {
            let x = c.x as f64;
            c.y >= self.line_min_y && x >= width / 3.0 && x <= width * 2.0 / 3.0
        });
        let command = avoid_line_rule(self.role, in_band);
        debug!(camera = %self.name, role = %self.role, in_band, %command, "avoid line");
        (mask, command)
    }

    pub fn avoid_object(
        &self,
        frame: &Frame,
        range: &ColorRange,
    ) -> (Mask, Result<Command, DecisionError>) {
        let mask = self.segmenter.segment(frame, range);
        let columns: Vec<u8> = self
            .contours
            .locate(&mask)
            .iter()
            .map(|c| self.mapper.column_of(c.x))
            .collect();
        let decision = avoid_object_rule(&columns);
        debug!(camera = %self.name, role = %self.role, ?columns, ?decision, "avoid object");
        (mask, decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::blob_locator::SingleCentroidLocator;
    use image::{Rgb, RgbImage};

    const ALL_ROLES: [CameraRole; 4] =
        [CameraRole::Front, CameraRole::Back, CameraRole::Left, CameraRole::Right];

    fn cells(rows: &[u8]) -> Vec<GridCell> {
        rows.iter().enumerate().map(|(i, &row)| GridCell::new(i as u8 % 5, row)).collect()
    }

    fn orange() -> ColorRange {
        ColorRange::new([0, 108, 255], [179, 255, 255])
    }

    fn frame_with_square(width: u32, height: u32, x0: u32, y0: u32, side: u32) -> Frame {
        let mut frame = RgbImage::from_pixel(width, height, Rgb([30, 30, 30]));
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                frame.put_pixel(x, y, Rgb([255, 128, 0]));
            }
        }
        frame
    }

    fn unit_with(role: CameraRole, frame: Frame) -> CameraDecisionUnit {
        let (width, height) = frame.dimensions();
        let source = move || -> Result<Frame, CaptureError> { Ok(frame.clone()) };
        CameraDecisionUnit::new(role.to_string(), role, Box::new(source), width, height)
    }

    #[test]
    fn right_camera_turns_right_on_any_sighting() {
        assert_eq!(chase_rule(CameraRole::Right, &[GridCell::new(4, 2)]), Command::TurnRight);
        let spread = [GridCell::new(0, 0), GridCell::new(2, 1)];
        assert_eq!(chase_rule(CameraRole::Right, &spread), Command::TurnRight);
    }

    #[test]
    fn left_camera_turns_left_on_any_sighting() {
        assert_eq!(chase_rule(CameraRole::Left, &[GridCell::new(0, 0)]), Command::TurnLeft);
    }

    #[test]
    fn nothing_in_view_is_noop_for_every_role() {
        for role in ALL_ROLES {
            assert_eq!(chase_rule(role, &[]), Command::Noop);
        }
    }

    #[test]
    fn front_camera_steers_by_average_row() {
        assert_eq!(chase_rule(CameraRole::Front, &cells(&[2])), Command::Forward);
        assert_eq!(chase_rule(CameraRole::Front, &cells(&[1, 2])), Command::Forward);
        assert_eq!(chase_rule(CameraRole::Front, &cells(&[1])), Command::TurnRight);
        assert_eq!(chase_rule(CameraRole::Front, &cells(&[0, 2])), Command::TurnRight);
        assert_eq!(chase_rule(CameraRole::Front, &cells(&[0])), Command::TurnRight);
    }

    #[test]
    fn back_camera_splits_at_two() {
        assert_eq!(chase_rule(CameraRole::Back, &cells(&[1, 2])), Command::TurnRight);
        assert_eq!(chase_rule(CameraRole::Back, &cells(&[2, 2, 2])), Command::TurnLeft);
        let mostly_low =
            [GridCell::new(0, 2), GridCell::new(1, 2), GridCell::new(2, 2), GridCell::new(3, 1)];
        assert_eq!(chase_rule(CameraRole::Back, &mostly_low), Command::TurnRight);
        assert_eq!(chase_rule(CameraRole::Back, &cells(&[2])), Command::TurnLeft);
    }

    #[test]
    fn back_camera_average_two_and_a_half_turns_left() {
        // Rows never exceed 2 in a real grid; the rule itself is still defined there.
        let cells = [GridCell::new(0, 2), GridCell::new(1, 3)];
        assert_eq!(chase_rule(CameraRole::Back, &cells), Command::TurnLeft);
    }

    #[test]
    fn steering_reads_rows_not_columns() {
        // Far-right column, middle row: the front camera still sees "too high".
        assert_eq!(chase_rule(CameraRole::Front, &[GridCell::new(4, 1)]), Command::TurnRight);
        assert_eq!(steering_axis(&GridCell::new(4, 1)), 1);
    }

    #[test]
    fn face_object_turns_forward_into_align() {
        assert_eq!(face_object_rule(CameraRole::Front, &cells(&[2])), Command::Align);
        assert_eq!(face_object_rule(CameraRole::Front, &cells(&[0])), Command::TurnRight);
        assert_eq!(face_object_rule(CameraRole::Right, &cells(&[2])), Command::TurnRight);
        assert_eq!(face_object_rule(CameraRole::Front, &[]), Command::Noop);
    }

    #[test]
    fn avoid_line_response_is_fixed_per_role() {
        assert_eq!(avoid_line_rule(CameraRole::Front, true), Command::Stop);
        assert_eq!(avoid_line_rule(CameraRole::Back, true), Command::Forward);
        assert_eq!(avoid_line_rule(CameraRole::Left, true), Command::TurnRight);
        assert_eq!(avoid_line_rule(CameraRole::Right, true), Command::TurnLeft);
        for role in ALL_ROLES {
            assert_eq!(avoid_line_rule(role, false), Command::Noop);
        }
    }

    #[test]
    fn avoid_object_takes_the_mode() {
        assert_eq!(avoid_object_rule(&[3, 3, 1]), Ok(Command::TurnRight));
        assert_eq!(avoid_object_rule(&[1, 0, 4, 4, 4]), Ok(Command::TurnLeft));
    }

    #[test]
    fn avoid_object_surfaces_undefined_results() {
        assert_eq!(avoid_object_rule(&[]), Err(DecisionError::NoObservations));
        assert_eq!(avoid_object_rule(&[0, 4]), Err(DecisionError::NoObservations));
        assert_eq!(
            avoid_object_rule(&[1, 3]),
            Err(DecisionError::AmbiguousMode { candidates: vec![1, 3] })
        );
        assert_eq!(
            avoid_object_rule(&[2, 2, 3]),
            Err(DecisionError::UnsteerableColumn { column: 2 })
        );
    }

    #[test]
    fn front_unit_drives_forward_at_a_low_target() {
        // Centre column, bottom row.
        let mut unit = unit_with(CameraRole::Front, frame_with_square(640, 480, 310, 400, 20));
        let (mask, command) = unit.decide(&orange()).expect("frame");
        assert_eq!(command, Command::Forward);
        assert_eq!(mask.dimensions(), (640, 480));
    }

    #[test]
    fn front_unit_with_empty_view_defers() {
        let mut unit = unit_with(CameraRole::Front, RgbImage::from_pixel(640, 480, Rgb([0, 0, 0])));
        let (_, command) = unit.decide(&orange()).expect("frame");
        assert_eq!(command, Command::Noop);
    }

    #[test]
    fn single_centroid_locator_can_drive_the_chase() {
        let unit = unit_with(CameraRole::Back, frame_with_square(640, 480, 50, 20, 10))
            .with_locator(Box::new(SingleCentroidLocator));
        let frame = frame_with_square(640, 480, 50, 20, 10);
        assert_eq!(unit.chase(&frame, &orange()).1, Command::TurnRight);
    }

    #[test]
    fn dimension_mismatch_is_a_capture_error() {
        let frame = RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]));
        let source = move || -> Result<Frame, CaptureError> { Ok(frame.clone()) };
        let mut unit =
            CameraDecisionUnit::new("front", CameraRole::Front, Box::new(source), 640, 480);
        match unit.decide(&orange()) {
            Err(CaptureError::DimensionMismatch { actual_width, .. }) => {
                assert_eq!(actual_width, 320)
            }
            other => panic!("expected dimension mismatch, got {:?}", other.map(|(_, c)| c)),
        }
    }

    #[test]
    fn avoid_line_ignores_lines_outside_the_band() {
        // A tall frame so the 715px threshold is reachable.
        let unit = unit_with(CameraRole::Front, RgbImage::new(600, 900));
        let centred_low = frame_with_square(600, 900, 290, 800, 20);
        let side_low = frame_with_square(600, 900, 20, 800, 20);
        let centred_high = frame_with_square(600, 900, 290, 100, 20);

        assert_eq!(unit.avoid_line(&centred_low, &orange()).1, Command::Stop);
        assert_eq!(unit.avoid_line(&side_low, &orange()).1, Command::Noop);
        assert_eq!(unit.avoid_line(&centred_high, &orange()).1, Command::Noop);
    }

    #[test]
    fn avoid_line_never_fires_below_threshold_at_default_height() {
        for role in ALL_ROLES {
            let unit = unit_with(role, RgbImage::new(640, 480));
            let frame = frame_with_square(640, 480, 300, 440, 30);
            assert_eq!(unit.avoid_line(&frame, &orange()).1, Command::Noop);
        }
    }

    #[test]
    fn avoid_object_through_the_unit() {
        let unit = unit_with(CameraRole::Front, RgbImage::new(640, 480));
        // Column 3 spans x in (373.33, 426.67].
        let frame = frame_with_square(640, 480, 390, 200, 20);
        assert_eq!(unit.avoid_object(&frame, &orange()).1, Ok(Command::TurnRight));
        let empty = RgbImage::new(640, 480);
        assert_eq!(
            unit.decide_frame(&empty, DecisionMode::AvoidObject, &orange()).err(),
            Some(DecisionError::NoObservations)
        );
    }
}
