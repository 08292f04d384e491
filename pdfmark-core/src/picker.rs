use serde::{Deserialize, Serialize};

/// Size of the page as rendered (document units) and as displayed (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasGeometry {
    pub render_width: f64,
    pub render_height: f64,
    pub display_width: f64,
    pub display_height: f64,
}

impl CanvasGeometry {
    pub fn scale_x(&self) -> f64 {
        self.render_width / self.display_width
    }

    pub fn scale_y(&self) -> f64 {
        self.render_height / self.display_height
    }

    fn is_degenerate(&self) -> bool {
        !(self.display_width > 0.0
            && self.display_height > 0.0
            && self.render_width.is_finite()
            && self.render_height.is_finite())
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= 0.0 && py >= 0.0 && px <= self.display_width && py <= self.display_height
    }

    /// Display pixel (origin top-left) to document point (origin bottom-left).
    pub fn to_document(&self, px: f64, py: f64) -> DocPoint {
        DocPoint {
            x: px * self.scale_x(),
            y: self.render_height - py * self.scale_y(),
        }
    }

    /// Document point back to display pixels.
    pub fn to_canvas(&self, point: DocPoint) -> (f64, f64) {
        (
            point.x / self.scale_x(),
            (self.render_height - point.y) / self.scale_y(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocPoint {
    pub x: f64,
    pub y: f64,
}

/// Transient marker painted where a destination points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationMarker {
    pub page: u32,
    pub point: DocPoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickedDestination<S> {
    pub page: u32,
    pub point: DocPoint,
    pub suspended: S,
}

#[derive(Debug, Clone)]
enum PickerState<S> {
    Idle,
    Picking { page: u32, suspended: S },
}

/// Two-state picker: idle, or picking on one page while holding the
/// suspended modal state `S` until the pick completes or is cancelled.
#[derive(Debug, Clone)]
pub struct DestinationPicker<S> {
    state: PickerState<S>,
    readout: Option<DocPoint>,
    marker: Option<DestinationMarker>,
}

impl<S> Default for DestinationPicker<S> {
    fn default() -> Self {
        Self {
            state: PickerState::Idle,
            readout: None,
            marker: None,
        }
    }
}

impl<S> DestinationPicker<S> {
    pub fn is_picking(&self) -> bool {
        matches!(self.state, PickerState::Picking { .. })
    }

    pub fn picking_page(&self) -> Option<u32> {
        match &self.state {
            PickerState::Picking { page, .. } => Some(*page),
            PickerState::Idle => None,
        }
    }

    /// Enters picking mode. Any previously suspended state is returned.
    pub fn begin(&mut self, page: u32, suspended: S) -> Option<S> {
        self.marker = None;
        self.readout = None;
        match std::mem::replace(&mut self.state, PickerState::Picking { page, suspended }) {
            PickerState::Picking { suspended, .. } => Some(suspended),
            PickerState::Idle => None,
        }
    }

    /// Follows page navigation while picking.
    pub fn retarget(&mut self, new_page: u32) {
        if let PickerState::Picking { page, .. } = &mut self.state {
            *page = new_page;
            self.readout = None;
        }
    }

    /// Live coordinate readout. Advisory only.
    pub fn hover(&mut self, px: f64, py: f64, geometry: &CanvasGeometry) -> Option<DocPoint> {
        if !self.is_picking() || geometry.is_degenerate() || !geometry.contains(px, py) {
            self.readout = None;
            return None;
        }
        let point = geometry.to_document(px, py);
        self.readout = Some(point);
        Some(point)
    }

    /// Completes the pick. A click outside the displayed page cancels instead,
    /// in which case `Err` carries the restored suspended state.
    pub fn click(
        &mut self,
        px: f64,
        py: f64,
        geometry: &CanvasGeometry,
    ) -> Result<PickedDestination<S>, Option<S>> {
        if !self.is_picking() {
            return Err(None);
        }
        if geometry.is_degenerate() || !geometry.contains(px, py) {
            return Err(self.cancel());
        }
        let point = geometry.to_document(px, py);
        match std::mem::replace(&mut self.state, PickerState::Idle) {
            PickerState::Picking { page, suspended } => {
                self.readout = None;
                self.marker = Some(DestinationMarker { page, point });
                Ok(PickedDestination {
                    page,
                    point,
                    suspended,
                })
            }
            PickerState::Idle => Err(None),
        }
    }

    pub fn cancel(&mut self) -> Option<S> {
        self.readout = None;
        self.marker = None;
        match std::mem::replace(&mut self.state, PickerState::Idle) {
            PickerState::Picking { suspended, .. } => Some(suspended),
            PickerState::Idle => None,
        }
    }

    pub fn readout(&self) -> Option<DocPoint> {
        self.readout
    }

    pub fn marker(&self) -> Option<DestinationMarker> {
        self.marker
    }

    pub fn set_marker(&mut self, marker: Option<DestinationMarker>) {
        self.marker = marker;
    }
}
