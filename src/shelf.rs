//! Derived state for the shelf view: the grid of slots per configured
//! column, what each slot holds, and which slots match a search.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{
    models::{Coordinate, Location, Product, ProductWithLocations, ShelfConfig},
    store::Snapshot,
};

/// Rendered column width plus gap.
pub const COLUMN_WIDTH_PX: i32 = 136;
/// Rendered row height plus gap.
pub const ROW_HEIGHT_PX: i32 = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Empty,
    Normal,
    Full,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Empty => "empty",
            SlotStatus::Normal => "normal",
            SlotStatus::Full => "full",
        }
    }
}

/// One product stored in a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockItem {
    pub code: String,
    pub name: String,
    pub cases: i32,
    pub quantity: i32,
}

impl StockItem {
    fn stored(entry: &ProductWithLocations, location: &Location) -> Self {
        Self {
            code: entry.product.code.clone(),
            name: entry.product.name.clone(),
            cases: location.cases,
            // Display only; a row too large to price shows the ceiling.
            quantity: entry.product.quantity_for(location.cases).unwrap_or(i32::MAX),
        }
    }
}

pub fn columns(configs: &BTreeMap<String, ShelfConfig>) -> Vec<String> {
    configs.keys().cloned().collect()
}

pub fn max_positions(configs: &BTreeMap<String, ShelfConfig>) -> i32 {
    configs.values().map(|c| c.positions).max().unwrap_or(0).max(0)
}

pub fn max_levels(configs: &BTreeMap<String, ShelfConfig>) -> i32 {
    configs.values().map(|c| c.levels).max().unwrap_or(0).max(0)
}

/// Levels as drawn, top shelf first.
pub fn levels_top_down(levels: i32) -> Vec<i32> {
    (1..=levels).rev().collect()
}

pub fn stock_at(products: &[ProductWithLocations], at: &Coordinate) -> Vec<StockItem> {
    products
        .iter()
        .filter_map(|entry| {
            let location = entry.locations.iter().find(|loc| loc.is_at(at))?;
            Some(StockItem::stored(entry, location))
        })
        .collect()
}

pub fn status(items: &[StockItem], full_threshold: i32) -> SlotStatus {
    if items.is_empty() {
        return SlotStatus::Empty;
    }
    let cases = items.iter().fold(0i32, |sum, item| sum.saturating_add(item.cases));
    if cases >= full_threshold {
        SlotStatus::Full
    } else {
        SlotStatus::Normal
    }
}

/// Case-insensitive substring match on code or name. A blank term matches
/// nothing.
pub fn matches_term(product: &Product, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    product.code.to_lowercase().contains(&term) || product.name.to_lowercase().contains(&term)
}

pub fn search<'a>(products: &'a [ProductWithLocations], term: &str) -> Vec<&'a ProductWithLocations> {
    products
        .iter()
        .filter(|entry| matches_term(&entry.product, term))
        .collect()
}

pub fn is_highlighted(products: &[ProductWithLocations], term: &str, at: &Coordinate) -> bool {
    products.iter().any(|entry| {
        matches_term(&entry.product, term) && entry.locations.iter().any(|loc| loc.is_at(at))
    })
}

/// Pixel offsets that bring a slot's column and position into view.
pub fn scroll_offset(columns: &[String], at: &Coordinate) -> Option<(i32, i32)> {
    let index = columns.iter().position(|c| *c == at.column)?;
    let position = at.position_number()?;
    Some((index as i32 * COLUMN_WIDTH_PX, (position - 1).max(0) * ROW_HEIGHT_PX))
}

/// The top level also holds anything stacked above it.
pub fn level_label(level: i32, levels: i32) -> String {
    if levels > 0 && level >= levels {
        format!("Level {} and above", level)
    } else {
        format!("Level {}", level)
    }
}

pub fn slot_id(at: &Coordinate) -> String {
    format!(
        "slot-{}-{}-{}",
        urlencoding::encode(&at.column),
        urlencoding::encode(&at.position),
        urlencoding::encode(&at.level)
    )
}

pub fn slot_href(term: &str, at: &Coordinate) -> String {
    format!(
        "/shelves?q={}&column={}&position={}&level={}#{}",
        urlencoding::encode(term),
        urlencoding::encode(&at.column),
        urlencoding::encode(&at.position),
        urlencoding::encode(&at.level),
        slot_id(at)
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfCell {
    pub coordinate: Coordinate,
    pub position: i32,
    pub level: i32,
    pub items: Vec<StockItem>,
    pub status: SlotStatus,
    pub highlighted: bool,
    pub selected: bool,
    pub level_label: String,
    pub slot_id: String,
    pub href: String,
}

impl ShelfCell {
    pub fn headline(&self) -> Option<&StockItem> {
        self.items.first()
    }

    pub fn css_class(&self) -> String {
        let mut class = format!("shelf-cell shelf-cell-{}", self.status.as_str());
        if self.highlighted {
            class.push_str(" shelf-cell-highlighted");
        }
        if self.selected {
            class.push_str(" shelf-cell-selected");
        }
        class
    }

    pub fn tooltip(&self) -> String {
        let mut lines = vec![format!(
            "Column {}, position {}, {}",
            self.coordinate.column,
            self.position,
            self.level_label.to_lowercase()
        )];
        lines.extend(
            self.items
                .iter()
                .map(|item| format!("{}: {} cases", item.name, item.cases)),
        );
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfPosition {
    pub position: i32,
    /// Top level first.
    pub cells: Vec<ShelfCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfColumn {
    pub name: String,
    pub levels: i32,
    pub positions: Vec<ShelfPosition>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotLink {
    pub coordinate: Coordinate,
    pub cases: i32,
    pub label: String,
    pub href: String,
    pub scroll_left: i32,
    pub scroll_top: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub code: String,
    pub name: String,
    pub total_cases: i32,
    pub locations: Vec<SlotLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectedSlot {
    pub coordinate: Coordinate,
    pub label: String,
    pub items: Vec<StockItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfGrid {
    pub columns: Vec<ShelfColumn>,
    pub max_positions: i32,
    pub max_levels: i32,
    pub search_term: String,
    pub search_hits: Vec<SearchHit>,
    pub selected: Option<SelectedSlot>,
}

/// Slot contents keyed by column and numeric position/level.
type SlotIndex = HashMap<(String, i32, i32), Vec<StockItem>>;

fn index_slots(products: &[ProductWithLocations]) -> SlotIndex {
    let mut index = SlotIndex::new();
    for entry in products {
        for location in &entry.locations {
            let coordinate = location.coordinate();
            let (Some(position), Some(level)) = (coordinate.position_number(), coordinate.level_number()) else {
                continue;
            };
            index
                .entry((coordinate.column, position, level))
                .or_default()
                .push(StockItem::stored(entry, location));
        }
    }
    index
}

fn label_for(at: &Coordinate, configs: &BTreeMap<String, ShelfConfig>) -> String {
    let levels = configs.get(&at.column).map(|c| c.levels).unwrap_or(0);
    let level = match at.level_number() {
        Some(level) => level_label(level, levels),
        None => format!("Level {}", at.level),
    };
    format!("Column {}, position {}, {}", at.column, at.position, level.to_lowercase())
}

impl ShelfGrid {
    pub fn build(snapshot: &Snapshot, term: &str, selected: Option<Coordinate>, full_threshold: i32) -> Self {
        let products = snapshot.products_with_locations();
        let configs = &snapshot.shelf_configs;
        let column_names = columns(configs);
        let term = term.trim().to_string();

        let mut index = index_slots(&products);

        let columns = configs
            .values()
            .map(|config| {
                let positions = (1..=config.positions.max(0))
                    .map(|position| {
                        let cells = levels_top_down(config.levels)
                            .into_iter()
                            .map(|level| {
                                let coordinate =
                                    Coordinate::new(&config.column, position.to_string(), level.to_string());
                                let items = index
                                    .remove(&(config.column.clone(), position, level))
                                    .unwrap_or_default();
                                ShelfCell {
                                    status: status(&items, full_threshold),
                                    highlighted: is_highlighted(&products, &term, &coordinate),
                                    selected: selected.as_ref().is_some_and(|s| s.matches(&coordinate)),
                                    level_label: level_label(level, config.levels),
                                    slot_id: slot_id(&coordinate),
                                    href: slot_href(&term, &coordinate),
                                    coordinate,
                                    position,
                                    level,
                                    items,
                                }
                            })
                            .collect();
                        ShelfPosition { position, cells }
                    })
                    .collect();
                ShelfColumn {
                    name: config.column.clone(),
                    levels: config.levels,
                    positions,
                }
            })
            .collect();

        let search_hits = search(&products, &term)
            .into_iter()
            .map(|entry| SearchHit {
                code: entry.product.code.clone(),
                name: entry.product.name.clone(),
                total_cases: entry.product.total_cases,
                locations: entry
                    .locations
                    .iter()
                    .map(|loc| {
                        let coordinate = loc.coordinate();
                        let (scroll_left, scroll_top) =
                            scroll_offset(&column_names, &coordinate).unwrap_or((0, 0));
                        SlotLink {
                            label: label_for(&coordinate, configs),
                            href: slot_href(&term, &coordinate),
                            cases: loc.cases,
                            scroll_left,
                            scroll_top,
                            coordinate,
                        }
                    })
                    .collect(),
            })
            .collect();

        let selected = selected.map(|coordinate| SelectedSlot {
            label: label_for(&coordinate, configs),
            items: stock_at(&products, &coordinate),
            coordinate,
        });

        Self {
            columns,
            max_positions: max_positions(configs),
            max_levels: max_levels(configs),
            search_term: term,
            search_hits,
            selected,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::*;

    fn item(cases: i32) -> StockItem {
        StockItem {
            code: "X".to_string(),
            name: "x".to_string(),
            cases,
            quantity: cases,
        }
    }

    #[test]
    fn columns_are_sorted_and_dimensions_take_the_maximum() {
        let snapshot = warehouse();
        assert_eq!(columns(&snapshot.shelf_configs), vec!["A", "B"]);
        assert_eq!(max_positions(&snapshot.shelf_configs), 4);
        assert_eq!(max_levels(&snapshot.shelf_configs), 3);
        assert_eq!(max_positions(&BTreeMap::new()), 0);
    }

    #[test]
    fn levels_render_top_first() {
        assert_eq!(levels_top_down(3), vec![3, 2, 1]);
        assert!(levels_top_down(0).is_empty());
    }

    #[test]
    fn slot_status_thresholds() {
        assert_eq!(status(&[], 30), SlotStatus::Empty);
        assert_eq!(status(&[item(29)], 30), SlotStatus::Normal);
        assert_eq!(status(&[item(20), item(10)], 30), SlotStatus::Full);
    }

    #[test]
    fn stock_at_reports_cases_and_quantity() {
        let products = warehouse().products_with_locations();

        let items = stock_at(&products, &Coordinate::new("A", "1", "1"));
        assert_eq!(
            items,
            vec![StockItem {
                code: "PRD001".to_string(),
                name: "Premium Coffee Beans".to_string(),
                cases: 30,
                quantity: 720,
            }]
        );

        assert!(stock_at(&products, &Coordinate::new("A", "2", "1")).is_empty());
    }

    #[test]
    fn search_is_case_insensitive_on_code_and_name() {
        let products = warehouse().products_with_locations();

        let codes = |term: &str| -> Vec<String> {
            search(&products, term).iter().map(|p| p.product.code.clone()).collect()
        };
        assert_eq!(codes("coffee"), vec!["PRD001"]);
        assert_eq!(codes("prd00"), vec!["PRD001", "PRD002", "PRD003"]);
        assert!(codes("").is_empty());
        assert!(codes("   ").is_empty());
        assert!(codes("rice").is_empty());
    }

    #[test]
    fn highlight_requires_a_match_stored_at_the_slot() {
        let products = warehouse().products_with_locations();

        assert!(is_highlighted(&products, "tea", &Coordinate::new("A", "1", "2")));
        assert!(!is_highlighted(&products, "tea", &Coordinate::new("A", "1", "1")));
        assert!(!is_highlighted(&products, "", &Coordinate::new("A", "1", "2")));
    }

    #[test]
    fn scroll_offsets_follow_column_index_and_position() {
        let columns = vec!["A".to_string(), "B".to_string()];

        assert_eq!(scroll_offset(&columns, &Coordinate::new("A", "1", "1")), Some((0, 0)));
        assert_eq!(scroll_offset(&columns, &Coordinate::new("B", "3", "2")), Some((136, 112)));
        assert_eq!(scroll_offset(&columns, &Coordinate::new("C", "1", "1")), None);
    }

    #[test]
    fn top_level_reads_and_above() {
        assert_eq!(level_label(3, 3), "Level 3 and above");
        assert_eq!(level_label(2, 3), "Level 2");
    }

    #[test]
    fn grid_marks_status_highlight_and_selection() {
        let snapshot = warehouse();
        let grid = ShelfGrid::build(&snapshot, "coffee", Some(Coordinate::new("B", "2", "3")), 30);

        assert_eq!(grid.columns.len(), 2);
        let a = &grid.columns[0];
        assert_eq!(a.positions.len(), 3);
        // Top level first.
        assert_eq!(a.positions[0].cells.iter().map(|c| c.level).collect::<Vec<_>>(), vec![3, 2, 1]);

        let a11 = &a.positions[0].cells[2];
        assert_eq!(a11.status, SlotStatus::Full);
        assert!(a11.highlighted);
        assert!(!a11.selected);

        let a12 = &a.positions[0].cells[1];
        assert_eq!(a12.status, SlotStatus::Normal);
        assert!(!a12.highlighted);

        let b23 = &grid.columns[1].positions[1].cells[0];
        assert!(b23.selected);
        assert!(b23.highlighted);
        assert!(b23.css_class().contains("shelf-cell-selected"));

        let selected = grid.selected.as_ref().unwrap();
        assert_eq!(selected.items.len(), 1);
        assert_eq!(selected.label, "Column B, position 2, level 3 and above");

        assert_eq!((grid.max_positions, grid.max_levels), (4, 3));
        assert_eq!(grid.search_hits.len(), 1);
        let links = &grid.search_hits[0].locations;
        assert_eq!(links.len(), 2);
        assert!(links.iter().any(|l| l.scroll_left == 136 && l.scroll_top == 56));
    }

    #[test]
    fn oversized_rows_display_without_overflowing() {
        let mut snapshot = warehouse();
        snapshot.locations[0].cases = i32::MAX;
        let at = snapshot.locations[0].coordinate();
        let products = snapshot.products_with_locations();

        let items = stock_at(&products, &at);
        assert_eq!(items[0].cases, i32::MAX);
        assert_eq!(items[0].quantity, i32::MAX);
        let grid = ShelfGrid::build(&snapshot, "", None, 30);
        assert!(!grid.is_empty());
    }

    #[test]
    fn hrefs_escape_the_search_term() {
        let href = slot_href("green tea", &Coordinate::new("A", "1", "2"));
        assert_eq!(href, "/shelves?q=green%20tea&column=A&position=1&level=2#slot-A-1-2");
    }
}
