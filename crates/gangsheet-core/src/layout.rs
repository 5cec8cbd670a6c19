//! Tiling layout: fill a footprint with copies of one element.
//!
//! Planning is pure: [`plan`] reads the scene and returns the cells to emit
//! and the ids to remove. [`TilingPlan::apply`] performs the bulk mutation.
//! Copies carry a lineage name (`copy-{source}-{n}`) so a later run can find
//! and replace them.

use crate::cache::ByteCache;
use crate::canvas::DocumentSettings;
use crate::duplicate::share_image_sources;
use crate::elements::{Element, ElementId};
use crate::scene::SceneStore;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Cells may overhang the footprint by this much (floating-point slack).
pub const FOOTPRINT_TOLERANCE: f64 = 1.0;

/// Gaps below this are taken to be centimeters typed without a unit.
pub const CM_GAP_HEURISTIC: f64 = 5.0;

/// Slack added before flooring fit counts so exact fits survive rounding.
const FIT_EPSILON: f64 = 1e-6;

const LINEAGE_PREFIX: &str = "copy-";

/// Upper bound on the cells a single run emits.
pub const MAX_TILE_CELLS: usize = 1000;

/// Inset applied to tiling requests decoded from JSON when none is given.
pub const DEFAULT_MARGIN_PX: f64 = 20.0;

fn default_margin() -> Option<Length> {
    Some(Length::Px(DEFAULT_MARGIN_PX))
}

/// Safety margin and gap of the print-ready shelf layout, in centimeters.
const SHELF_MARGIN_CM: f64 = 1.0;
const SHELF_GAP_CM: f64 = 0.5;

/// Errors from tiling.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("No element to tile: nothing selected and no eligible element found")]
    MissingSource,
    #[error("Element {0} cannot be tiled")]
    SourceNotFound(ElementId),
    #[error(
        "An item of {item_width:.1}x{item_height:.1}px does not fit in a \
         {area_width:.1}x{area_height:.1}px footprint"
    )]
    CapacityExceeded {
        item_width: f64,
        item_height: f64,
        area_width: f64,
        area_height: f64,
    },
    #[error("Footprint length must be positive and finite, got {0}")]
    InvalidExtent(f64),
}

/// A length in centimeters or pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    Cm(f64),
    Px(f64),
}

impl Length {
    pub fn to_px(self, settings: &DocumentSettings) -> f64 {
        match self {
            Length::Cm(cm) => settings.cm_to_px(cm),
            Length::Px(px) => px,
        }
    }
}

/// Shape of the tiled area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TilingMode {
    /// Rows and columns across the area width, down to the target extent.
    #[default]
    Grid,
    /// A single row; the target extent is the row length.
    Row,
    /// A single column; the target extent is the column height.
    Column,
    /// Batches of differently sized copies flowed left to right into
    /// shelves; the target extent is the height limit.
    Shelf,
}

/// Horizontal placement of the packed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileAlignment {
    Center,
    Start,
}

/// One run of same-sized copies in a shelf layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShelfBatch {
    /// Item width for this batch. Height follows the element's aspect.
    #[serde(default)]
    pub item_width: Option<Length>,
    /// Number of copies. `None` fills the footprint.
    #[serde(default)]
    pub count: Option<usize>,
}

/// Parameters of a tiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingRequest {
    /// Element to tile. Falls back to the selection, then to the most recent
    /// eligible element.
    #[serde(default)]
    pub source: Option<ElementId>,
    #[serde(default)]
    pub mode: TilingMode,
    /// Extent of the footprint along the filled axis.
    pub target_extent: Length,
    /// Per-item width override. Height follows the element's aspect.
    #[serde(default)]
    pub item_width: Option<Length>,
    /// Per-item height override, used when no width override is given.
    #[serde(default)]
    pub item_height: Option<Length>,
    /// Width of the area. Defaults to the canvas width.
    #[serde(default)]
    pub area_width: Option<Length>,
    /// Inset from the area edges; the footprint starts at (margin, margin).
    /// Decoded requests default to [`DEFAULT_MARGIN_PX`]; [`TilingRequest::new`]
    /// starts flush with the area.
    #[serde(default = "default_margin")]
    pub margin: Option<Length>,
    /// Gap in pixels.
    #[serde(default)]
    pub gap: f64,
    #[serde(default)]
    pub alignment: Option<TileAlignment>,
    /// Stretch the horizontal gap so columns span the area exactly.
    #[serde(default)]
    pub distribute: bool,
    /// Fixed number of copies. In grid mode they form a near-square block of
    /// `ceil(sqrt(count))` columns instead of filling row by row.
    #[serde(default, alias = "max_count")]
    pub count: Option<usize>,
    /// Batches for [`TilingMode::Shelf`]. Empty means one batch that fills
    /// the footprint at the element's current size.
    #[serde(default)]
    pub batches: Vec<ShelfBatch>,
}

impl TilingRequest {
    pub fn new(mode: TilingMode, target_extent: Length) -> Self {
        Self {
            source: None,
            mode,
            target_extent,
            item_width: None,
            item_height: None,
            area_width: None,
            margin: None,
            gap: 0.0,
            alignment: None,
            distribute: false,
            count: None,
            batches: Vec::new(),
        }
    }

    /// Print-ready shelf layout: 1 cm safety margin and a 0.5 cm gap, limited
    /// to `height` down the sheet.
    pub fn shelf(batches: Vec<ShelfBatch>, height: Length) -> Self {
        Self {
            margin: Some(Length::Cm(SHELF_MARGIN_CM)),
            gap: SHELF_GAP_CM,
            batches,
            ..Self::new(TilingMode::Shelf, height)
        }
    }
}

/// Non-blocking notes about a layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutAdvisory {
    /// Copies print below the minimum useful resolution.
    LowResolution { effective_dpi: f64 },
    /// Emission stopped at the per-run cell limit.
    CellLimit { limit: usize },
}

/// Summary of a tiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingOutcome {
    pub source_id: ElementId,
    pub rows: usize,
    pub cols: usize,
    pub placed: usize,
    /// Item size; the widest batch for shelf layouts.
    pub item_width: f64,
    pub item_height: f64,
    pub gap_x: f64,
    pub gap_y: f64,
    /// Horizontal offset of the block inside the margin.
    pub offset_x: f64,
    pub advisories: Vec<LayoutAdvisory>,
}

/// Cells to emit and elements to replace.
#[derive(Debug, Clone)]
pub struct TilingPlan {
    pub removed: Vec<ElementId>,
    pub cells: Vec<Element>,
    pub outcome: TilingOutcome,
}

impl TilingPlan {
    /// Remove the source and its previous copies, then append the cells.
    pub fn apply(self, scene: &mut SceneStore) -> TilingOutcome {
        scene.remove_many(&self.removed);
        for cell in self.cells {
            scene.add(cell);
        }
        self.outcome
    }
}

/// Name carried by the `n`th copy of `source`.
pub fn lineage_name(source: ElementId, n: usize) -> String {
    format!("{LINEAGE_PREFIX}{source}-{n}")
}

/// Source id encoded in a lineage name.
pub fn lineage_source(name: &str) -> Option<ElementId> {
    let rest = name.strip_prefix(LINEAGE_PREFIX)?;
    let (id, n) = rest.rsplit_once('-')?;
    n.parse::<usize>().ok()?;
    Uuid::parse_str(id).ok()
}

fn is_lineage_copy(element: &Element) -> bool {
    element.name().and_then(lineage_source).is_some()
}

/// Pick the element to tile.
///
/// Explicit id, then the selection primary, then the last unlocked
/// non-copy element in insertion order. A lineage copy resolves to its
/// original when that still exists.
pub fn resolve_source(
    scene: &SceneStore,
    explicit: Option<ElementId>,
    primary: Option<ElementId>,
) -> Result<ElementId, LayoutError> {
    let chosen = match explicit.or(primary) {
        Some(id) => {
            if scene.index_of(id).is_none() {
                return Err(LayoutError::SourceNotFound(id));
            }
            id
        }
        None => scene
            .elements()
            .iter()
            .rev()
            .find(|e| !e.is_locked() && !is_lineage_copy(e))
            .map(|e| e.id())
            .ok_or(LayoutError::MissingSource)?,
    };

    let original = scene
        .find(chosen)
        .and_then(|e| e.name())
        .and_then(lineage_source)
        .filter(|id| scene.index_of(*id).is_some());
    Ok(original.unwrap_or(chosen))
}

fn fit_count(space: f64, step: f64) -> usize {
    if step <= 0.0 || !space.is_finite() {
        return 1;
    }
    (((space + FIT_EPSILON) / step).floor().max(1.0)) as usize
}

/// Unscaled size of an element. Groups report their bounds divided by their
/// own scale.
fn base_size(element: &Element) -> Size {
    element.intrinsic_size().unwrap_or_else(|| {
        let base = element.base();
        let bounds = element.bounds();
        Size::new(bounds.width() / base.scale_x, bounds.height() / base.scale_y)
    })
}

/// Copy of `source` rescaled to the requested item width (or height), and
/// the resulting item size. The scale ratio of the source is kept.
fn scaled_template(
    source: &Element,
    width: Option<Length>,
    height: Option<Length>,
    settings: &DocumentSettings,
) -> (Element, Size) {
    let base = base_size(source);
    let (mut scale_x, mut scale_y) = (source.base().scale_x, source.base().scale_y);
    let ratio = scale_x / scale_y;
    if let Some(width) = width {
        scale_x = width.to_px(settings) / base.width;
        scale_y = scale_x / ratio;
    } else if let Some(height) = height {
        scale_y = height.to_px(settings) / base.height;
        scale_x = scale_y * ratio;
    }
    let mut template = source.clone();
    template.base_mut().scale_x = scale_x;
    template.base_mut().scale_y = scale_y;
    (template, Size::new(base.width * scale_x, base.height * scale_y))
}

/// Push a cell. The first keeps the source identity, later ones get fresh
/// ids and a lineage name.
fn push_cell(cells: &mut Vec<Element>, template: &Element, source_id: ElementId, at: Point) {
    let mut cell = template.clone();
    if !cells.is_empty() {
        cell.regenerate_ids();
        cell.base_mut().name = Some(lineage_name(source_id, cells.len()));
    }
    cell.set_position(at);
    cells.push(cell);
}

fn fits(item: Size) -> bool {
    item.width > 0.0 && item.height > 0.0
}

/// Resolved footprint of a run, in pixels.
struct Frame {
    margin: f64,
    extent: f64,
    area_width: f64,
    gap: f64,
}

impl Frame {
    fn resolve(request: &TilingRequest, settings: &DocumentSettings) -> Result<Self, LayoutError> {
        let extent = request.target_extent.to_px(settings);
        let area_width = request
            .area_width
            .map(|l| l.to_px(settings))
            .unwrap_or(settings.width);
        let margin = request.margin.map(|l| l.to_px(settings)).unwrap_or(0.0);
        for value in [extent, area_width] {
            if !(value.is_finite() && value > 0.0) {
                return Err(LayoutError::InvalidExtent(value));
            }
        }
        if !(margin.is_finite() && margin >= 0.0) {
            return Err(LayoutError::InvalidExtent(margin));
        }

        let mut gap = if request.gap.is_finite() { request.gap.max(0.0) } else { 0.0 };
        if gap > 0.0 && gap < CM_GAP_HEURISTIC {
            gap = settings.cm_to_px(gap);
        }
        Ok(Self {
            margin,
            extent,
            area_width,
            gap,
        })
    }

    /// Width available between the margins.
    fn inner_width(&self) -> f64 {
        (self.area_width - 2.0 * self.margin).max(0.0)
    }
}

/// Cells of a run before removal and advisories are worked out.
struct Packed {
    cells: Vec<Element>,
    rows: usize,
    cols: usize,
    item: Size,
    gap_x: f64,
    gap_y: f64,
    offset_x: f64,
    truncated: bool,
}

fn pack_grid(
    source: &Element,
    source_id: ElementId,
    settings: &DocumentSettings,
    request: &TilingRequest,
    frame: &Frame,
) -> Result<Packed, LayoutError> {
    let (template, item) =
        scaled_template(source, request.item_width, request.item_height, settings);
    let (item_w, item_h) = (item.width, item.height);
    let gap = frame.gap;

    let (avail_w, avail_h) = match request.mode {
        TilingMode::Row => (frame.extent, item_h),
        _ => (frame.inner_width(), frame.extent),
    };
    let capacity_exceeded = || LayoutError::CapacityExceeded {
        item_width: item_w,
        item_height: item_h,
        area_width: avail_w,
        area_height: avail_h,
    };
    if !fits(item)
        || item_w > avail_w + FOOTPRINT_TOLERANCE
        || item_h > avail_h + FOOTPRINT_TOLERANCE
    {
        return Err(capacity_exceeded());
    }

    let mut cols = match request.mode {
        TilingMode::Column => 1,
        _ => fit_count(avail_w, item_w + gap),
    };
    let mut rows = match request.mode {
        TilingMode::Row => 1,
        _ => fit_count(avail_h, item_h + gap),
    };
    if let (TilingMode::Grid, Some(count)) = (request.mode, request.count) {
        // Near-square block, narrowed to what fits across.
        let side = ((count.max(1) as f64).sqrt().ceil() as usize).max(1);
        cols = side.min(cols);
        rows = count.max(1).div_ceil(cols);
    }

    let mut gap_x = gap;
    if request.distribute && cols > 1 {
        gap_x = (avail_w - cols as f64 * item_w) / (cols - 1) as f64;
    }
    let gap_y = gap;

    let centered = match request.alignment {
        Some(TileAlignment::Center) => true,
        Some(TileAlignment::Start) => false,
        None => !request.distribute,
    };
    let offset_x = if centered {
        let used = cols as f64 * item_w + (cols.saturating_sub(1)) as f64 * gap_x;
        ((avail_w - used) / 2.0).max(0.0)
    } else {
        0.0
    };

    let limit = request.count.unwrap_or(usize::MAX);
    let mut cells = Vec::new();
    let mut truncated = false;
    'grid: for r in 0..rows {
        let y = r as f64 * (item_h + gap_y);
        if y + item_h > avail_h + FOOTPRINT_TOLERANCE {
            break;
        }
        for c in 0..cols {
            if cells.len() >= limit {
                break 'grid;
            }
            if cells.len() >= MAX_TILE_CELLS {
                truncated = true;
                break 'grid;
            }
            let x = offset_x + c as f64 * (item_w + gap_x);
            if x + item_w > avail_w + FOOTPRINT_TOLERANCE {
                continue;
            }
            let at = Point::new(frame.margin + x, frame.margin + y);
            push_cell(&mut cells, &template, source_id, at);
        }
    }
    if cells.is_empty() {
        return Err(capacity_exceeded());
    }
    Ok(Packed {
        cells,
        rows,
        cols,
        item,
        gap_x,
        gap_y,
        offset_x,
        truncated,
    })
}

/// Flow batches left to right, wrapping into a new shelf when the next item
/// would cross the right margin. Each shelf is as tall as its tallest item.
fn pack_shelves(
    source: &Element,
    source_id: ElementId,
    settings: &DocumentSettings,
    request: &TilingRequest,
    frame: &Frame,
) -> Result<Packed, LayoutError> {
    let fill = [ShelfBatch::default()];
    let batches = if request.batches.is_empty() {
        &fill[..]
    } else {
        &request.batches[..]
    };
    let gap = frame.gap;
    let inner_w = frame.inner_width();
    let right = frame.area_width - frame.margin;
    let bottom = frame.margin + frame.extent;

    let (mut x, mut y, mut shelf_h) = (frame.margin, frame.margin, 0.0_f64);
    let (mut rows, mut cols, mut in_shelf) = (0, 0, 0);
    let mut widest: Option<Size> = None;
    let mut rejected: Option<Size> = None;
    let mut cells = Vec::new();
    let mut truncated = false;

    'batches: for batch in batches {
        let (template, item) = scaled_template(source, batch.item_width, None, settings);
        if !fits(item)
            || item.width > inner_w + FOOTPRINT_TOLERANCE
            || item.height > frame.extent + FOOTPRINT_TOLERANCE
        {
            log::warn!(
                "shelf batch of {:.1}x{:.1}px items does not fit, skipped",
                item.width,
                item.height
            );
            rejected.get_or_insert(item);
            continue;
        }
        if widest.is_none_or(|w| item.width > w.width) {
            widest = Some(item);
        }

        let count = batch.count.unwrap_or_else(|| {
            fit_count(inner_w, item.width + gap) * fit_count(frame.extent, item.height + gap)
        });
        for _ in 0..count {
            if cells.len() >= MAX_TILE_CELLS {
                truncated = true;
                break 'batches;
            }
            if in_shelf > 0 && x + item.width > right + FOOTPRINT_TOLERANCE {
                x = frame.margin;
                y += shelf_h + gap;
                shelf_h = 0.0;
                in_shelf = 0;
            }
            if y + item.height > bottom + FOOTPRINT_TOLERANCE {
                break;
            }
            push_cell(&mut cells, &template, source_id, Point::new(x, y));
            if in_shelf == 0 {
                rows += 1;
            }
            in_shelf += 1;
            cols = cols.max(in_shelf);
            shelf_h = shelf_h.max(item.height);
            x += item.width + gap;
        }
    }

    let item = widest.or(rejected).unwrap_or(Size::ZERO);
    if cells.is_empty() {
        return Err(LayoutError::CapacityExceeded {
            item_width: item.width,
            item_height: item.height,
            area_width: inner_w,
            area_height: frame.extent,
        });
    }
    Ok(Packed {
        cells,
        rows,
        cols,
        item,
        gap_x: gap,
        gap_y: gap,
        offset_x: 0.0,
        truncated,
    })
}

/// Compute a tiling without touching the scene.
pub fn plan(
    scene: &SceneStore,
    primary: Option<ElementId>,
    settings: &DocumentSettings,
    request: &TilingRequest,
    min_print_dpi: f64,
) -> Result<TilingPlan, LayoutError> {
    let source_id = resolve_source(scene, request.source, primary)?;
    let source = scene
        .find(source_id)
        .ok_or(LayoutError::SourceNotFound(source_id))?;
    let frame = Frame::resolve(request, settings)?;

    let packed = match request.mode {
        TilingMode::Shelf => pack_shelves(source, source_id, settings, request, &frame)?,
        _ => pack_grid(source, source_id, settings, request, &frame)?,
    };

    let mut removed = vec![source_id];
    removed.extend(
        scene
            .elements()
            .iter()
            .filter(|e| e.name().and_then(lineage_source) == Some(source_id))
            .map(|e| e.id()),
    );

    let mut advisories = Vec::new();
    if let Some(image) = source.as_image() {
        if packed.item.width > 0.0 && image.source_width > 0 {
            let effective_dpi = image.source_width as f64 * settings.dpi / packed.item.width;
            if effective_dpi < min_print_dpi {
                advisories.push(LayoutAdvisory::LowResolution { effective_dpi });
            }
        }
    }
    if packed.truncated {
        log::warn!("tiling {source_id} stopped at {MAX_TILE_CELLS} cells");
        advisories.push(LayoutAdvisory::CellLimit {
            limit: MAX_TILE_CELLS,
        });
    }

    let outcome = TilingOutcome {
        source_id,
        rows: packed.rows,
        cols: packed.cols,
        placed: packed.cells.len(),
        item_width: packed.item.width,
        item_height: packed.item.height,
        gap_x: packed.gap_x,
        gap_y: packed.gap_y,
        offset_x: packed.offset_x,
        advisories,
    };
    log::info!(
        "tiling {} placed {} cell(s) in {}x{} (item {:.1}x{:.1}px)",
        source_id,
        outcome.placed,
        outcome.cols,
        outcome.rows,
        outcome.item_width,
        outcome.item_height
    );
    Ok(TilingPlan {
        removed,
        cells: packed.cells,
        outcome,
    })
}

/// Plan and apply in one step, moving image bytes into the cache first so
/// the cells reference a shared key.
pub fn tile(
    scene: &mut SceneStore,
    primary: Option<ElementId>,
    settings: &DocumentSettings,
    request: &TilingRequest,
    min_print_dpi: f64,
    cache: &dyn ByteCache,
) -> Result<TilingOutcome, LayoutError> {
    // Validate before touching the cache or the scene.
    let source_id = plan(scene, primary, settings, request, min_print_dpi)?
        .outcome
        .source_id;
    if let Some(source) = scene.find_mut(source_id) {
        share_image_sources(source, cache);
    }
    let planned = plan(scene, primary, settings, request, min_print_dpi)?;
    Ok(planned.apply(scene))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::elements::{Image, ImageFormat, Shape, ShapeKind};

    fn settings(width: f64, height: f64, dpi: f64) -> DocumentSettings {
        DocumentSettings {
            width,
            height,
            dpi,
            ..Default::default()
        }
    }

    fn square(size: f64) -> Element {
        Element::Shape(Shape::new(ShapeKind::Rectangle, Point::ZERO, size, size))
    }

    #[test]
    fn test_lineage_names() {
        let id = Uuid::new_v4();
        let name = lineage_name(id, 7);
        assert_eq!(lineage_source(&name), Some(id));
        assert_eq!(lineage_source("copy-nope-1"), None);
        assert_eq!(lineage_source(&format!("copy-{id}-x")), None);
        assert_eq!(lineage_source("logo"), None);
    }

    #[test]
    fn test_grid_fill_coverage() {
        // 50cm wide canvas at 300 DPI, 100cm footprint, 10cm items, no gap.
        let s = settings(DocumentSettings::cm_to_px_at(50.0, 300.0), 20_000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(100.0));

        let mut request = TilingRequest::new(TilingMode::Grid, Length::Cm(100.0));
        request.item_height = Some(Length::Cm(10.0));
        let cache = MemoryByteCache::new();
        let outcome = tile(&mut scene, Some(id), &s, &request, 150.0, &cache).unwrap();

        assert_eq!(outcome.cols, 5);
        assert_eq!(outcome.rows, 10);
        assert_eq!(outcome.placed, 50);
        assert_eq!(scene.len(), 50);
        for element in scene.elements() {
            assert!(element.bounds().x1 <= s.width + FOOTPRINT_TOLERANCE);
        }
        // First cell keeps the source identity.
        assert_eq!(scene.elements()[0].id(), id);
        assert_eq!(scene.elements()[1].name(), Some(lineage_name(id, 1).as_str()));
    }

    #[test]
    fn test_capacity_exceeded_leaves_scene_untouched() {
        let s = settings(500.0, 500.0, 300.0);
        let image = Image::new(Point::ZERO, b"img", 200, 200, ImageFormat::Png);
        let mut scene = SceneStore::new();
        let id = scene.add(Element::Image(image));
        let before = scene.clone();

        let mut request = TilingRequest::new(TilingMode::Grid, Length::Px(60.0));
        request.gap = 10.0;
        let cache = MemoryByteCache::new();
        let err = tile(&mut scene, Some(id), &s, &request, 150.0, &cache).unwrap_err();
        assert!(matches!(err, LayoutError::CapacityExceeded { .. }));
        assert_eq!(scene, before);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_source() {
        let s = settings(500.0, 500.0, 300.0);
        let mut scene = SceneStore::new();
        let request = TilingRequest::new(TilingMode::Grid, Length::Px(100.0));
        let cache = MemoryByteCache::new();
        assert_eq!(
            tile(&mut scene, None, &s, &request, 150.0, &cache).unwrap_err(),
            LayoutError::MissingSource
        );
    }

    #[test]
    fn test_source_inference_skips_locked_and_copies() {
        let mut scene = SceneStore::new();
        let first = scene.add(square(10.0));
        let mut locked = square(10.0);
        locked.base_mut().locked = true;
        scene.add(locked);
        let mut copy = square(10.0);
        copy.base_mut().name = Some(lineage_name(first, 1));
        scene.add(copy);
        assert_eq!(resolve_source(&scene, None, None), Ok(first));
    }

    #[test]
    fn test_selected_copy_resolves_to_original() {
        let mut scene = SceneStore::new();
        let original = scene.add(square(10.0));
        let mut copy = square(10.0);
        copy.base_mut().name = Some(lineage_name(original, 3));
        let copy_id = scene.add(copy);
        assert_eq!(resolve_source(&scene, None, Some(copy_id)), Ok(original));
    }

    #[test]
    fn test_retiling_replaces_previous_copies() {
        let s = settings(100.0, 100.0, 300.0);
        let mut scene = SceneStore::new();
        let other = scene.add(square(5.0));
        let id = scene.add(square(20.0));
        let cache = MemoryByteCache::new();

        let request = TilingRequest::new(TilingMode::Grid, Length::Px(100.0));
        let first = tile(&mut scene, Some(id), &s, &request, 150.0, &cache).unwrap();
        assert_eq!(first.placed, 25);
        assert_eq!(scene.len(), 26);

        let mut request = TilingRequest::new(TilingMode::Row, Length::Px(100.0));
        request.gap = 10.0;
        let second = tile(&mut scene, Some(id), &s, &request, 150.0, &cache).unwrap();
        // floor(100 / 30) = 3
        assert_eq!(second.placed, 3);
        assert_eq!(scene.len(), 4);
        assert!(scene.contains(other));
        assert!(scene.contains(id));
    }

    #[test]
    fn test_small_gap_is_centimeters() {
        let s = settings(1000.0, 1000.0, 254.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(100.0));
        let mut request = TilingRequest::new(TilingMode::Row, Length::Px(1000.0));
        request.gap = 1.0;
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        // 1cm at 254 DPI is 100px.
        assert!((plan.outcome.gap_x - 100.0).abs() < 1e-9);
        assert_eq!(plan.outcome.cols, 5);
    }

    #[test]
    fn test_centering_and_start_alignment() {
        let s = settings(100.0, 100.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(30.0));

        let request = TilingRequest::new(TilingMode::Row, Length::Px(100.0));
        let centered = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(centered.outcome.cols, 3);
        assert!((centered.outcome.offset_x - 5.0).abs() < 1e-9);
        assert!((centered.cells[0].base().x - 5.0).abs() < 1e-9);

        let mut request = request.clone();
        request.alignment = Some(TileAlignment::Start);
        let start = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(start.outcome.offset_x, 0.0);
    }

    #[test]
    fn test_distribute_spans_area() {
        let s = settings(100.0, 100.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(30.0));
        let mut request = TilingRequest::new(TilingMode::Row, Length::Px(100.0));
        request.distribute = true;
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert!((plan.outcome.gap_x - 5.0).abs() < 1e-9);
        assert!((plan.outcome.offset_x - 0.0).abs() < 1e-9);
        let last = plan.cells.last().unwrap().bounds();
        assert!((last.x1 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_item_width_keeps_aspect_ratio() {
        let s = settings(1000.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let mut element =
            Element::Shape(Shape::new(ShapeKind::Rectangle, Point::ZERO, 100.0, 50.0));
        element.base_mut().scale_x = 2.0;
        element.base_mut().scale_y = 1.0;
        let id = scene.add(element);

        let mut request = TilingRequest::new(TilingMode::Column, Length::Px(1000.0));
        request.item_width = Some(Length::Px(50.0));
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        // scale_x = 0.5, ratio 2 -> scale_y = 0.25
        assert!((plan.outcome.item_width - 50.0).abs() < 1e-9);
        assert!((plan.outcome.item_height - 12.5).abs() < 1e-9);
        assert_eq!(plan.outcome.cols, 1);
    }

    #[test]
    fn test_fixed_count_forms_near_square_block() {
        let s = settings(100.0, 100.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(10.0));
        let mut request = TilingRequest::new(TilingMode::Grid, Length::Px(100.0));
        request.count = Some(7);
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.cells.len(), 7);
        assert_eq!(plan.outcome.cols, 3);
        assert_eq!(plan.outcome.rows, 3);
        // Three columns of 10px centered in 100px.
        assert!((plan.outcome.offset_x - 35.0).abs() < 1e-9);
        assert_eq!(plan.cells[3].position(), Point::new(35.0, 10.0));
        assert_eq!(plan.cells[6].position(), Point::new(35.0, 20.0));
    }

    #[test]
    fn test_count_caps_single_row() {
        let s = settings(100.0, 100.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(10.0));
        let mut request = TilingRequest::new(TilingMode::Row, Length::Px(100.0));
        request.count = Some(4);
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.cells.len(), 4);
        assert_eq!(plan.outcome.rows, 1);
    }

    #[test]
    fn test_margin_insets_footprint() {
        let s = settings(120.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(20.0));
        let mut request = TilingRequest::new(TilingMode::Grid, Length::Px(100.0));
        request.margin = Some(Length::Px(10.0));
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.outcome.cols, 5);
        assert_eq!(plan.outcome.rows, 5);
        assert_eq!(plan.cells[0].position(), Point::new(10.0, 10.0));
        let last = plan.cells.last().unwrap().bounds();
        assert!((last.x1 - 110.0).abs() < 1e-9);
        assert!((last.y1 - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_decoded_request_defaults_to_margin() {
        let s = settings(140.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(20.0));
        let request: TilingRequest =
            serde_json::from_str(r#"{"target_extent": {"px": 100}}"#).unwrap();
        assert_eq!(request.margin, Some(Length::Px(DEFAULT_MARGIN_PX)));

        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.outcome.cols, 5);
        assert_eq!(plan.cells[0].position(), Point::new(20.0, 20.0));
    }

    #[test]
    fn test_shelf_flows_mixed_batches() {
        let s = settings(100.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(10.0));
        let mut request = TilingRequest::new(TilingMode::Shelf, Length::Px(100.0));
        request.batches = vec![
            ShelfBatch {
                item_width: Some(Length::Px(40.0)),
                count: Some(3),
            },
            ShelfBatch {
                item_width: Some(Length::Px(20.0)),
                count: Some(2),
            },
        ];
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        let positions: Vec<Point> = plan.cells.iter().map(Element::position).collect();
        assert_eq!(
            positions,
            vec![
                Point::new(0.0, 0.0),
                Point::new(40.0, 0.0),
                Point::new(0.0, 40.0),
                Point::new(40.0, 40.0),
                Point::new(60.0, 40.0),
            ]
        );
        assert_eq!(plan.cells[0].id(), id);
        assert!((plan.cells[0].base().scale_x - 4.0).abs() < 1e-9);
        assert!((plan.cells[4].base().scale_x - 2.0).abs() < 1e-9);
        assert_eq!(plan.outcome.rows, 2);
        assert_eq!(plan.outcome.cols, 3);
        assert!((plan.outcome.item_width - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_shelf_defaults_fill_with_margin() {
        // 254 DPI: 1cm is 100px, so the margin is 100px and the gap 50px.
        let s = settings(1000.0, 2000.0, 254.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(100.0));
        let request = TilingRequest::shelf(Vec::new(), Length::Cm(10.0));
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.outcome.placed, 30);
        assert_eq!(plan.outcome.cols, 5);
        assert_eq!(plan.outcome.rows, 6);
        assert!((plan.outcome.gap_x - 50.0).abs() < 1e-9);
        assert_eq!(plan.cells[0].position(), Point::new(100.0, 100.0));
        for cell in &plan.cells {
            assert!(cell.bounds().x1 <= 900.0 + FOOTPRINT_TOLERANCE);
        }
    }

    #[test]
    fn test_cell_limit_bounds_huge_footprints() {
        let s = settings(1000.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(1.0));
        let request = TilingRequest::new(TilingMode::Grid, Length::Px(1.0e9));
        let plan = plan(&scene, Some(id), &s, &request, 150.0).unwrap();
        assert_eq!(plan.cells.len(), MAX_TILE_CELLS);
        assert!(plan.outcome.advisories.contains(&LayoutAdvisory::CellLimit {
            limit: MAX_TILE_CELLS
        }));
    }

    #[test]
    fn test_non_finite_extent_is_rejected() {
        let s = settings(1000.0, 1000.0, 300.0);
        let mut scene = SceneStore::new();
        let id = scene.add(square(10.0));
        for extent in [f64::NAN, f64::INFINITY, 0.0] {
            let request = TilingRequest::new(TilingMode::Grid, Length::Px(extent));
            let result = plan(&scene, Some(id), &s, &request, 150.0);
            assert!(matches!(result, Err(LayoutError::InvalidExtent(_))));
        }
    }

    #[test]
    fn test_low_resolution_advisory() {
        let s = settings(5000.0, 5000.0, 300.0);
        let image = Image::new(Point::ZERO, b"img", 100, 100, ImageFormat::Png);
        let mut scene = SceneStore::new();
        let id = scene.add(Element::Image(image));
        let cache = MemoryByteCache::new();

        let mut request = TilingRequest::new(TilingMode::Row, Length::Px(5000.0));
        request.item_width = Some(Length::Px(1000.0));
        let outcome = tile(&mut scene, Some(id), &s, &request, 150.0, &cache).unwrap();
        assert_eq!(
            outcome.advisories,
            vec![LayoutAdvisory::LowResolution {
                effective_dpi: 30.0
            }]
        );
        // Every cell references the same cached bytes.
        let keys: Vec<_> = scene
            .elements()
            .iter()
            .map(|e| e.as_image().and_then(|i| i.cache_key()).map(str::to_owned))
            .collect();
        assert!(keys.iter().all(|k| k.is_some() && *k == keys[0]));
        assert_eq!(cache.len(), 1);
    }
}
