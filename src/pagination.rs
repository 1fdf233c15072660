use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::config::PaginationConfig;
use crate::hierarchy::Hierarchy;
use crate::highlight::{HighlightState, Materialized, highlight_path};
use crate::layout::{Layout, LinkLayout};

pub type PageTag = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Deferred callbacks. The host calls [`PaginationController::on_timer`] when a timer fires.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId;
    fn cancel(&mut self, id: TimerId);
}

/// Everything the surface needs to realize one page.
#[derive(Debug)]
pub struct PageDraw<'a> {
    pub page: PageTag,
    pub levels: &'a BTreeSet<usize>,
    pub layout: &'a Layout,
    /// Positions in `layout.nodes`.
    pub nodes: Vec<usize>,
    /// Indices in `layout.links`, already filtered for this page.
    pub links: Vec<usize>,
}

/// Surface that materializes tagged pages of a layout.
pub trait RenderingAdapter {
    /// Must be idempotent for a repeated tag with identical data.
    fn draw(&mut self, page: &PageDraw<'_>);
    fn erase(&mut self, page: PageTag);
    fn show_empty(&mut self) {}
    fn on_progress(&mut self, _percent: u32) {}
    fn on_ready(&mut self, _hierarchy: &Hierarchy) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page {0} is not materialized")]
    UnknownPage(PageTag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Seeding,
    Expanding,
    /// User contracted or expanded by hand; resumes on [`PaginationController::expand`].
    Paused,
    Done,
}

#[derive(Debug, Clone, Default)]
struct PageContent {
    /// Inclusive level range live once this page is drawn.
    covered: (usize, usize),
    nodes: Vec<usize>,
    links: Vec<usize>,
}

/// Materializes a layout a few levels at a time. Page 1 holds the levels around
/// the center node and every tick adds `stagger` levels on each side until all
/// levels are live.
pub struct PaginationController<R, S> {
    adapter: R,
    scheduler: S,
    config: PaginationConfig,
    hierarchy: Hierarchy,
    layout: Layout,
    phase: Phase,
    page: PageTag,
    page_to_levels: BTreeMap<PageTag, BTreeSet<usize>>,
    pages: BTreeMap<PageTag, PageContent>,
    levels_to_plot: BTreeSet<usize>,
    center_level: usize,
    pending: Option<TimerId>,
    ready_fired: bool,
}

impl<R: RenderingAdapter, S: Scheduler> PaginationController<R, S> {
    pub fn new(adapter: R, scheduler: S, config: PaginationConfig) -> Self {
        Self {
            adapter,
            scheduler,
            config,
            hierarchy: Hierarchy::default(),
            layout: Layout::empty(Default::default()),
            phase: Phase::Idle,
            page: 0,
            page_to_levels: BTreeMap::new(),
            pages: BTreeMap::new(),
            levels_to_plot: BTreeSet::new(),
            center_level: 0,
            pending: None,
            ready_fired: false,
        }
    }

    /// Replaces the data, cancelling any pending step, and seeds page 1.
    pub fn load(&mut self, hierarchy: Hierarchy, layout: Layout) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
        }
        let stale: Vec<PageTag> = self.pages.keys().rev().copied().collect();
        for page in stale {
            self.adapter.erase(page);
        }
        self.hierarchy = hierarchy;
        self.layout = layout;
        self.page = 0;
        self.page_to_levels.clear();
        self.pages.clear();
        self.levels_to_plot.clear();
        self.center_level = 0;
        self.ready_fired = false;
        self.phase = Phase::Idle;

        if self.layout.is_empty() {
            self.adapter.show_empty();
            return;
        }

        self.center_level = self
            .layout
            .center_level(self.config.center_node.as_deref());
        let stagger = self.config.stagger();
        let max_level = self.layout.max_level;
        let lo = self.center_level.saturating_sub(stagger);
        let hi = (self.center_level + stagger).min(max_level);
        self.push_page((lo..=hi).collect(), (lo, hi));

        self.phase = Phase::Seeding;
        self.pending = Some(
            self.scheduler
                .schedule(Duration::from_millis(self.config.initial_delay_ms)),
        );
    }

    /// Timer callback. Ids other than the pending one are ignored.
    pub fn on_timer(&mut self, id: TimerId) {
        if self.pending != Some(id) {
            return;
        }
        self.pending = None;
        if matches!(self.phase, Phase::Seeding | Phase::Expanding) && self.step() {
            self.phase = Phase::Expanding;
            self.pending = Some(
                self.scheduler
                    .schedule(Duration::from_millis(self.config.step_delay_ms)),
            );
        }
    }

    /// Adds one page right away without scheduling another. Returns whether a page was added.
    pub fn expand(&mut self) -> bool {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
        }
        if self.page == 0 {
            return false;
        }
        let added = self.step();
        if added {
            self.phase = Phase::Paused;
        }
        added
    }

    /// Drops the highest page. Page 1 is never dropped.
    pub fn contract(&mut self) -> bool {
        if self.page <= 1 {
            return false;
        }
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel(id);
        }
        self.phase = Phase::Paused;
        let dropped = self.page;
        self.page_to_levels.remove(&dropped);
        self.pages.remove(&dropped);
        self.page -= 1;
        self.levels_to_plot = self
            .page_to_levels
            .get(&self.page)
            .cloned()
            .unwrap_or_default();
        self.adapter.erase(dropped);
        debug!(page = dropped, "page contracted");
        true
    }

    /// Erases and redraws one tracked page, keeping links that cross its boundary.
    pub fn rechunk(&mut self, page: PageTag) -> Result<(), PaginationError> {
        let levels = self
            .page_to_levels
            .get(&page)
            .cloned()
            .ok_or(PaginationError::UnknownPage(page))?;
        let covered = self.covered().unwrap_or((0, 0));
        self.adapter.erase(page);

        let nodes = nodes_on_levels(&self.layout, &levels);
        let links: Vec<usize> = self
            .layout
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| both_within(link, covered) && keep_on_rechunk(link, &levels))
            .map(|(idx, _)| idx)
            .collect();
        self.adapter.draw(&PageDraw {
            page,
            levels: &levels,
            layout: &self.layout,
            nodes: nodes.clone(),
            links: links.clone(),
        });
        if let Some(content) = self.pages.get_mut(&page) {
            content.nodes = nodes;
            content.links = links;
        }
        Ok(())
    }

    /// Adds the next page if any level is still missing, otherwise signals ready.
    fn step(&mut self) -> bool {
        let Some((lo, hi)) = self.covered() else {
            return false;
        };
        let max_level = self.layout.max_level;
        if lo == 0 && hi >= max_level {
            self.finish();
            return false;
        }
        let stagger = self.config.stagger();
        let new_lo = lo.saturating_sub(stagger);
        let new_hi = (hi + stagger).min(max_level);
        let levels: BTreeSet<usize> = (new_lo..lo).chain(hi + 1..=new_hi).collect();
        self.push_page(levels, (new_lo, new_hi));
        true
    }

    fn push_page(&mut self, levels: BTreeSet<usize>, covered: (usize, usize)) {
        self.page += 1;
        let page = self.page;
        let nodes = nodes_on_levels(&self.layout, &levels);
        let links: Vec<usize> = self
            .layout
            .links
            .iter()
            .enumerate()
            .filter(|(_, link)| {
                both_within(link, covered)
                    && (levels.contains(&link.source_level) || levels.contains(&link.target_level))
            })
            .map(|(idx, _)| idx)
            .collect();

        debug!(page, levels = ?levels, nodes = nodes.len(), links = links.len(), "drawing page");
        self.adapter.draw(&PageDraw {
            page,
            levels: &levels,
            layout: &self.layout,
            nodes: nodes.clone(),
            links: links.clone(),
        });
        self.pages.insert(
            page,
            PageContent {
                covered,
                nodes,
                links,
            },
        );
        self.levels_to_plot = levels.clone();
        self.page_to_levels.insert(page, levels);

        let total = self.layout.max_level + 1;
        let live = covered.1 - covered.0 + 1;
        self.adapter.on_progress((live * 100 / total) as u32);
    }

    fn finish(&mut self) {
        self.phase = Phase::Done;
        if self.ready_fired {
            return;
        }
        self.ready_fired = true;
        debug!(pages = self.page, "all levels materialized");
        self.adapter.on_progress(100);
        self.adapter.on_ready(&self.hierarchy);
    }

    fn covered(&self) -> Option<(usize, usize)> {
        self.pages.get(&self.page).map(|content| content.covered)
    }

    pub fn materialized(&self) -> Materialized {
        let mut live = Materialized::default();
        for content in self.pages.values() {
            live.nodes.extend(content.nodes.iter().copied());
            live.links.extend(content.links.iter().copied());
        }
        live
    }

    pub fn highlight(&self, clicked: &str) -> Option<HighlightState> {
        highlight_path(&self.layout, &self.materialized(), clicked)
    }

    pub fn page(&self) -> PageTag {
        self.page
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn levels_to_plot(&self) -> &BTreeSet<usize> {
        &self.levels_to_plot
    }

    pub fn page_to_levels(&self) -> &BTreeMap<PageTag, BTreeSet<usize>> {
        &self.page_to_levels
    }

    pub fn center_level(&self) -> usize {
        self.center_level
    }

    pub fn max_available_levels(&self) -> usize {
        self.layout.max_level
    }

    pub fn is_ready(&self) -> bool {
        self.ready_fired
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn adapter(&self) -> &R {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut R {
        &mut self.adapter
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn into_adapter(self) -> R {
        self.adapter
    }
}

impl<R: RenderingAdapter> PaginationController<R, ManualScheduler> {
    /// Fires pending timers in order until nothing is scheduled or `max_pages` pages are live.
    pub fn run_until_idle(&mut self, max_pages: Option<PageTag>) {
        loop {
            if max_pages.is_some_and(|limit| self.page >= limit) && !self.is_ready() {
                break;
            }
            let Some(id) = self.scheduler.next_due() else {
                break;
            };
            self.on_timer(id);
        }
    }
}

/// Link retention rule used when a single page is redrawn in isolation.
pub fn keep_on_rechunk(link: &LinkLayout, levels: &BTreeSet<usize>) -> bool {
    if link.involves_attached() {
        return true;
    }
    if link.source_level.abs_diff(link.target_level) > 1 {
        return true;
    }
    if link.target_level <= link.source_level {
        return true;
    }
    levels.contains(&link.source_level) || levels.contains(&link.target_level)
}

fn both_within(link: &LinkLayout, (lo, hi): (usize, usize)) -> bool {
    (lo..=hi).contains(&link.source_level) && (lo..=hi).contains(&link.target_level)
}

fn nodes_on_levels(layout: &Layout, levels: &BTreeSet<usize>) -> Vec<usize> {
    layout
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| levels.contains(&node.level))
        .map(|(idx, _)| idx)
        .collect()
}

/// FIFO scheduler driven by the caller; nothing ever sleeps.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    queue: VecDeque<(TimerId, Duration)>,
    elapsed: Duration,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pops the next timer, advancing the simulated clock by its delay.
    pub fn next_due(&mut self) -> Option<TimerId> {
        let (id, delay) = self.queue.pop_front()?;
        self.elapsed += delay;
        Some(id)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.queue.push_back((id, delay));
        id
    }

    fn cancel(&mut self, id: TimerId) {
        self.queue.retain(|(pending, _)| *pending != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::hierarchy::build_hierarchy;
    use crate::ir::LineageData;
    use crate::layout::compute_layout;

    #[derive(Debug, Default)]
    struct Recorder {
        draws: Vec<(PageTag, Vec<String>, Vec<usize>)>,
        erased: Vec<PageTag>,
        progress: Vec<u32>,
        ready: usize,
        empty: bool,
    }

    impl RenderingAdapter for Recorder {
        fn draw(&mut self, page: &PageDraw<'_>) {
            let ids = page
                .nodes
                .iter()
                .map(|&idx| page.layout.nodes[idx].id.clone())
                .collect();
            self.draws.push((page.page, ids, page.links.clone()));
        }

        fn erase(&mut self, page: PageTag) {
            self.erased.push(page);
        }

        fn show_empty(&mut self) {
            self.empty = true;
        }

        fn on_progress(&mut self, percent: u32) {
            self.progress.push(percent);
        }

        fn on_ready(&mut self, _hierarchy: &Hierarchy) {
            self.ready += 1;
        }
    }

    fn chain(len: usize) -> LineageData {
        let mut data = LineageData::new();
        for idx in 0..len - 1 {
            data.link(&format!("n{idx}"), &format!("n{}", idx + 1));
        }
        data
    }

    fn controller(
        data: &LineageData,
        config: PaginationConfig,
    ) -> PaginationController<Recorder, ManualScheduler> {
        let hierarchy = build_hierarchy(data);
        let layout = compute_layout(&hierarchy, &LayoutConfig::default());
        let mut controller =
            PaginationController::new(Recorder::default(), ManualScheduler::new(), config);
        controller.load(hierarchy, layout);
        controller
    }

    fn levels(values: &[usize]) -> BTreeSet<usize> {
        values.iter().copied().collect()
    }

    fn centered(stagger: usize) -> PaginationConfig {
        PaginationConfig {
            stagger_load: stagger,
            center_node: Some("n5".to_string()),
            ..PaginationConfig::default()
        }
    }

    #[test]
    fn pages_expand_outward_from_center() {
        let mut controller = controller(&chain(11), centered(2));
        assert_eq!(controller.max_available_levels(), 10);
        assert_eq!(controller.center_level(), 5);
        assert_eq!(controller.phase(), Phase::Seeding);
        assert_eq!(controller.levels_to_plot(), &levels(&[3, 4, 5, 6, 7]));

        let id = controller.scheduler_mut().next_due().unwrap();
        controller.on_timer(id);
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.levels_to_plot(), &levels(&[1, 2, 8, 9]));

        let id = controller.scheduler_mut().next_due().unwrap();
        controller.on_timer(id);
        assert_eq!(controller.levels_to_plot(), &levels(&[0, 10]));
        assert!(!controller.is_ready());

        let id = controller.scheduler_mut().next_due().unwrap();
        controller.on_timer(id);
        assert!(controller.is_ready());
        assert_eq!(controller.phase(), Phase::Done);
        assert_eq!(controller.adapter().ready, 1);
        assert!(!controller.has_pending());
        assert_eq!(controller.scheduler_mut().next_due(), None);
        assert_eq!(controller.adapter().progress.last(), Some(&100));
    }

    #[test]
    fn pages_are_disjoint_and_move_away_from_center() {
        let mut controller = controller(&chain(23), centered(3));
        controller.run_until_idle(None);
        assert!(controller.is_ready());

        let pages = controller.page_to_levels();
        let center = controller.center_level();
        let mut seen = BTreeSet::new();
        let mut previous_max_distance = 0;
        for (page, levels) in pages {
            assert!(levels.is_disjoint(&seen), "page {page} overlaps");
            seen.extend(levels.iter().copied());
            let min_distance = levels.iter().map(|l| l.abs_diff(center)).min().unwrap();
            let max_distance = levels.iter().map(|l| l.abs_diff(center)).max().unwrap();
            if *page > 1 {
                assert!(min_distance > previous_max_distance);
            }
            previous_max_distance = max_distance;
        }
        assert_eq!(seen, (0..=22).collect::<BTreeSet<usize>>());
    }

    #[test]
    fn ready_fires_once_and_expansion_stops() {
        let mut controller = controller(&chain(4), PaginationConfig::default());
        controller.run_until_idle(None);
        assert_eq!(controller.page(), 1);
        assert_eq!(controller.adapter().ready, 1);
        assert!(!controller.expand());
        assert_eq!(controller.adapter().ready, 1);
        assert_eq!(controller.page(), 1);
    }

    #[test]
    fn contract_restores_previous_page() {
        let mut controller = controller(&chain(11), centered(2));
        controller.run_until_idle(None);
        assert_eq!(controller.page(), 3);

        assert!(controller.contract());
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.levels_to_plot(), &levels(&[1, 2, 8, 9]));
        assert_eq!(controller.adapter().erased, vec![3]);
        let live = controller.materialized();
        let level_zero = controller.layout().position_of("n0").unwrap();
        assert!(!live.nodes.contains(&level_zero));

        assert!(controller.contract());
        assert_eq!(controller.levels_to_plot(), &levels(&[3, 4, 5, 6, 7]));
        assert!(!controller.contract());

        assert!(controller.expand());
        assert_eq!(controller.levels_to_plot(), &levels(&[1, 2, 8, 9]));
        assert_eq!(controller.adapter().ready, 1);
    }

    #[test]
    fn contract_after_full_load_leaves_done() {
        let mut controller = controller(&chain(11), centered(1));
        controller.run_until_idle(None);
        assert_eq!(controller.phase(), Phase::Done);
        assert_eq!(controller.page(), 5);

        assert!(controller.contract());
        assert_eq!(controller.phase(), Phase::Paused);
        assert!(controller.contract());
        assert!(controller.expand());
        assert_eq!(controller.page(), 4);
        assert_eq!(controller.levels_to_plot(), &levels(&[1, 9]));
        assert_eq!(controller.phase(), Phase::Paused);

        assert!(controller.expand());
        assert_eq!(controller.phase(), Phase::Paused);
        assert!(!controller.expand());
        assert_eq!(controller.phase(), Phase::Done);
        assert_eq!(controller.adapter().ready, 1);
    }

    #[test]
    fn each_link_is_drawn_once_during_expansion() {
        let mut data = chain(9);
        data.link("n6", "n1");
        data.link("n8", "n2");
        let mut controller = controller(
            &data,
            PaginationConfig {
                stagger_load: 1,
                center_node: Some("n4".to_string()),
                ..PaginationConfig::default()
            },
        );
        controller.run_until_idle(None);
        let mut drawn: Vec<usize> = controller
            .adapter()
            .draws
            .iter()
            .flat_map(|(_, _, links)| links.iter().copied())
            .collect();
        drawn.sort();
        let all: Vec<usize> = (0..controller.layout().links.len()).collect();
        assert_eq!(drawn, all);
    }

    #[test]
    fn rechunk_keeps_long_and_backward_links() {
        let mut data = chain(9);
        data.link("n6", "n1");
        data.link("n8", "n2");
        let mut controller = controller(
            &data,
            PaginationConfig {
                stagger_load: 1,
                center_node: Some("n4".to_string()),
                ..PaginationConfig::default()
            },
        );
        controller.run_until_idle(None);
        controller.rechunk(1).expect("page 1 is tracked");

        let (page, ids, links) = controller.adapter().draws.last().cloned().unwrap();
        assert_eq!(page, 1);
        assert_eq!(ids, vec!["n3", "n4", "n5"]);
        let layout = controller.layout();
        for (idx, link) in layout.links.iter().enumerate() {
            if link.source_level.abs_diff(link.target_level) > 1 {
                assert!(links.contains(&idx), "{} -> {}", link.source, link.target);
            }
        }
        let far = layout
            .links
            .iter()
            .position(|link| link.source == "n0" && link.target == "n1")
            .unwrap();
        assert!(!links.contains(&far));
        assert_eq!(
            controller.rechunk(42),
            Err(PaginationError::UnknownPage(42))
        );
    }

    #[test]
    fn reload_cancels_pending_timer_and_resets() {
        let mut controller = controller(&chain(30), centered(1));
        let id = controller.scheduler_mut().next_due().unwrap();
        controller.on_timer(id);
        assert_eq!(controller.page(), 2);

        let data = chain(3);
        let hierarchy = build_hierarchy(&data);
        let layout = compute_layout(&hierarchy, &LayoutConfig::default());
        controller.load(hierarchy, layout);
        assert_eq!(controller.scheduler_mut().pending(), 1);
        assert_eq!(controller.page(), 1);
        assert_eq!(controller.adapter().erased, vec![2, 1]);
        assert_eq!(controller.page_to_levels().len(), 1);

        // stale timer ids are ignored
        controller.on_timer(id);
        assert_eq!(controller.page(), 1);
    }

    #[test]
    fn empty_data_shows_placeholder() {
        let mut controller = controller(&LineageData::new(), PaginationConfig::default());
        controller.run_until_idle(None);
        assert!(controller.adapter().empty);
        assert_eq!(controller.adapter().ready, 0);
        assert_eq!(controller.page(), 0);
    }

    #[test]
    fn zero_stagger_still_makes_progress() {
        let mut controller = controller(
            &chain(5),
            PaginationConfig {
                stagger_load: 0,
                ..PaginationConfig::default()
            },
        );
        controller.run_until_idle(None);
        assert!(controller.is_ready());
        assert_eq!(controller.page(), 4);
    }

    #[test]
    fn rechunk_filter_rules() {
        let link = |source_level, target_level, attached| LinkLayout {
            source: "s".to_string(),
            target: "t".to_string(),
            source_node: 0,
            target_node: 1,
            source_level,
            target_level,
            source_attached: attached,
            target_attached: false,
            class: crate::hierarchy::LinkClass::Overlay,
            bidirectional: false,
            points: Vec::new(),
        };
        let page = levels(&[5]);
        assert!(keep_on_rechunk(&link(1, 2, true), &page));
        assert!(keep_on_rechunk(&link(1, 3, false), &page));
        assert!(keep_on_rechunk(&link(3, 1, false), &page));
        assert!(keep_on_rechunk(&link(2, 2, false), &page));
        assert!(keep_on_rechunk(&link(4, 5, false), &page));
        assert!(!keep_on_rechunk(&link(1, 2, false), &page));
    }
}
