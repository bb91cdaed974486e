//! The dashboard context.
//!
//! [`Dashboard`] owns every piece of mutable state: the signal and pattern
//! stores, the ticker map, the level cache, the push connection and the
//! virtual list. Outside code only feeds it inputs (transport events, backend
//! responses, timer fires, user actions) and reads views back. Capabilities
//! are injected, so the whole engine runs under virtual time in tests.

use super::{
    backend::{Backend, Request, Response},
    bus::{EventBus, SubscriptionId},
    cache::AuxCache,
    config::DashboardConfig,
    connection::{ConnectionManager, ConnectionStatus},
    correlate::associate,
    filter::{DerivedView, FilterConfig, PatternFilter, derive, derive_patterns, pattern_types},
    levels::{LadderRow, NearestLevels, level_ladder, nearest_for},
    ranking::{
        HistoryPoint, RankingRow, RankingSort, RankingSource, RankingView, SortOrder,
        history_points,
    },
    scheduler::{Fired, ManualScheduler, Scheduler, Timer, TimerHandle, delta},
    settings::{KeyValueStore, Settings, SettingsError},
    store::MasterStore,
    viewport::{ListRow, VirtualList, WindowUpdate},
    visibility::{FetchScheduler, VisibilityObserver, WindowVisibility},
};
use chrono::{DateTime, Utc};
use derive_more::Display;
use itertools::Itertools;
use pivot_data::{
    event::PushEvent,
    model::{
        CompareWindow, Pattern, Period, PivotLevels, PivotStatusResponse, RankingKind, Signal,
        TickerMap, TickerSnapshot,
    },
    streams::{StreamClient, TransportEvent},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Dashboard tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum Tab {
    #[default]
    Signals,
    Patterns,
    Volume,
    Trades,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Signals, Tab::Patterns, Tab::Volume, Tab::Trades];

    pub fn next(self) -> Self {
        match self {
            Tab::Signals => Tab::Patterns,
            Tab::Patterns => Tab::Volume,
            Tab::Volume => Tab::Trades,
            Tab::Trades => Tab::Signals,
        }
    }

    pub fn ranking_kind(self) -> Option<RankingKind> {
        match self {
            Tab::Volume => Some(RankingKind::Volume),
            Tab::Trades => Some(RankingKind::Trades),
            Tab::Signals | Tab::Patterns => None,
        }
    }

    /// Rows of this tab carry pivot level decorations.
    fn decorated(self) -> bool {
        !matches!(self, Tab::Patterns)
    }
}

/// What changed in the derived views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// The filtered signal list was rebuilt
    Signals,
    Patterns,
    Ranking(RankingKind),
    RankingHistory(String),
    /// The level detail of this symbol changed: levels arrived or its price moved
    LevelDetail(String),
    /// Decorations of these visible rows changed, the row list did not
    Rows(Vec<String>),
    PivotStatus,
}

/// Filtered signals over an immutable store snapshot.
#[derive(Debug, Clone, Default)]
pub struct SignalView {
    pub records: Arc<Vec<Signal>>,
    pub derived: DerivedView,
    /// Store version the snapshot was taken at
    pub version: u64,
}

impl SignalView {
    pub fn len(&self) -> usize {
        self.derived.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derived.filtered.is_empty()
    }

    /// Signal on filtered row `row`.
    pub fn get(&self, row: usize) -> Option<&Signal> {
        self.derived
            .filtered
            .get(row)
            .and_then(|index| self.records.get(*index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.derived
            .filtered
            .iter()
            .filter_map(|index| self.records.get(*index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatternView {
    pub records: Arc<Vec<Pattern>>,
    pub filtered: Vec<usize>,
}

impl PatternView {
    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Pattern> {
        self.filtered
            .get(row)
            .and_then(|index| self.records.get(*index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.filtered
            .iter()
            .filter_map(|index| self.records.get(*index))
    }
}

/// Ranking history of one symbol, requested on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingDetail {
    pub symbol: String,
    pub loading: bool,
    pub points: Vec<HistoryPoint>,
}

/// Level ladder preview of one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelDetail {
    pub symbol: String,
    pub period: Period,
    /// A fetch is outstanding and no fresh levels are cached
    pub loading: bool,
}

pub struct Dashboard<S, C, B> {
    config: DashboardConfig,
    settings: Settings,
    scheduler: S,
    backend: B,
    connection: ConnectionManager<C>,
    signals: MasterStore<Signal>,
    patterns: MasterStore<Pattern>,
    tickers: TickerMap,
    levels: AuxCache<String, PivotLevels>,
    filter: FilterConfig,
    pattern_filter: PatternFilter,
    signal_view: SignalView,
    pattern_view: PatternView,
    ranking: RankingView,
    compare: Option<CompareWindow>,
    history: Option<RankingDetail>,
    level_detail: Option<LevelDetail>,
    pattern_detail: Option<String>,
    pivot_status: Option<PivotStatusResponse>,
    tab: Tab,
    list: VirtualList,
    visibility: WindowVisibility,
    fetches: FetchScheduler,
    status_timer: Option<TimerHandle>,
    clock_timer: Option<TimerHandle>,
    status_bus: EventBus<ConnectionStatus>,
    view_bus: EventBus<ViewChange>,
    rows_bus: EventBus<WindowUpdate>,
}

impl<S, C, B> Dashboard<S, C, B>
where
    S: Scheduler,
    C: StreamClient,
    B: Backend,
{
    pub fn new(config: DashboardConfig, scheduler: S, client: C, backend: B) -> Self {
        let settings = Settings {
            limit: config.signal_limit,
            ..Default::default()
        };

        Self {
            settings,
            scheduler,
            backend,
            connection: ConnectionManager::new(client, config.backoff()),
            signals: MasterStore::new(config.signal_limit),
            patterns: MasterStore::new(config.pattern_limit),
            tickers: TickerMap::default(),
            levels: AuxCache::new(config.level_ttl),
            filter: FilterConfig::default(),
            pattern_filter: PatternFilter::default(),
            signal_view: SignalView::default(),
            pattern_view: PatternView::default(),
            ranking: RankingView::new(),
            compare: None,
            history: None,
            level_detail: None,
            pattern_detail: None,
            pivot_status: None,
            tab: Tab::default(),
            list: VirtualList::new(config.geometry),
            visibility: WindowVisibility::new(),
            fetches: FetchScheduler::new(config.fetch_debounce),
            status_timer: None,
            clock_timer: None,
            status_bus: EventBus::new(),
            view_bus: EventBus::new(),
            rows_bus: EventBus::new(),
            config,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Open the push stream, issue the bulk loads and start the periodic timers.
    pub fn start(&mut self) {
        let server = self.config.server_url.clone();
        self.open(&server);
        self.refresh();

        for handle in [self.status_timer.take(), self.clock_timer.take()]
            .into_iter()
            .flatten()
        {
            self.scheduler.cancel(handle);
        }
        self.status_timer = Some(
            self.scheduler
                .after(self.config.status_poll_interval, Timer::StatusPoll),
        );
        self.clock_timer = Some(
            self.scheduler
                .after(self.config.relative_time_interval, Timer::RelativeTime),
        );
    }

    /// Subscribe to the push stream of `server` and send later backend
    /// requests there. Returns `false` if that subscription is already live.
    ///
    /// Records loaded from a previous server are kept; [`Self::refresh`]
    /// reloads from the new one.
    pub fn open(&mut self, server: &str) -> bool {
        let opened = self.connection.open(server, &mut self.scheduler);
        if opened {
            if let Some(server) = self.connection.server() {
                self.backend.set_server(server);
                self.config.server_url = server.to_string();
            }
        }
        self.publish_status();
        opened
    }

    pub fn close(&mut self) {
        self.connection.close(&mut self.scheduler);
        self.publish_status();
    }

    /// Reload tickers, patterns, history, pivot status and rankings.
    pub fn refresh(&mut self) {
        info!("Refreshing dashboard data");
        self.backend.submit(Request::Tickers);
        self.backend.submit(Request::Patterns {
            limit: self.config.pattern_load_limit,
        });
        self.backend.submit(Request::History {
            limit: self.settings.limit,
        });
        self.backend.submit(Request::PivotStatus);
        self.request_ranking(RankingKind::Volume);
        self.request_ranking(RankingKind::Trades);
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub fn on_status_change(
        &mut self,
        handler: impl FnMut(&ConnectionStatus) + Send + 'static,
    ) -> SubscriptionId {
        self.status_bus.subscribe(handler)
    }

    pub fn on_view_change(
        &mut self,
        handler: impl FnMut(&ViewChange) + Send + 'static,
    ) -> SubscriptionId {
        self.view_bus.subscribe(handler)
    }

    /// Called once per change of the materialized rows.
    pub fn on_rows_materialized(
        &mut self,
        handler: impl FnMut(&WindowUpdate) + Send + 'static,
    ) -> SubscriptionId {
        self.rows_bus.subscribe(handler)
    }

    // ========================================================================
    // Inputs
    // ========================================================================

    pub fn on_transport(&mut self, event: TransportEvent) {
        let push = self.connection.on_transport(event, &mut self.scheduler);
        self.publish_status();

        if let Some(push) = push {
            self.apply_push(push);
        }
    }

    pub fn on_response(&mut self, response: Response) {
        match response {
            Response::History(Ok(mut signals)) => {
                signals.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
                let patterns = self.patterns.snapshot();
                for signal in signals.iter_mut() {
                    associate(signal, &patterns);
                }

                let changed = self.signals.merge_batch(signals);
                info!(changed, total = self.signals.len(), "Loaded signal history");
                self.rederive_signals();
            }
            Response::History(Err(e)) => warn!("History request failed: {}", e),

            Response::Patterns(Ok(patterns)) => {
                let changed = self.patterns.merge_batch(patterns);
                info!(changed, total = self.patterns.len(), "Loaded patterns");
                self.rederive_patterns();
                self.associate_signals(None);
            }
            Response::Patterns(Err(e)) => warn!("Pattern request failed: {}", e),

            Response::Tickers(Ok(tickers)) => self.merge_tickers(tickers),
            Response::Tickers(Err(e)) => warn!("Ticker request failed: {}", e),

            Response::Levels { symbol, result } => {
                self.fetches.on_complete(&symbol);
                match result {
                    Ok(levels) => {
                        let now = self.scheduler.now();
                        self.levels.insert(symbol.clone(), levels, now);
                        if self.visibility.is_visible(&symbol) {
                            self.view_bus.emit(&ViewChange::Rows(vec![symbol.clone()]));
                        }
                    }
                    Err(e) => debug!(%symbol, "Level fetch failed: {}", e),
                }

                if let Some(detail) = self
                    .level_detail
                    .as_mut()
                    .filter(|detail| detail.symbol == symbol)
                {
                    detail.loading = false;
                    self.view_bus.emit(&ViewChange::LevelDetail(symbol));
                }
            }

            Response::Ranking { kind, compare, .. } if compare != self.compare => debug!(
                kind = kind.as_str(),
                ?compare,
                current = ?self.compare,
                "Discarding ranking for a superseded compare window"
            ),
            Response::Ranking { kind, result, .. } => match result {
                Ok(ranking) => {
                    self.ranking.set_server(kind, ranking);
                    self.sync_rows();
                    self.view_bus.emit(&ViewChange::Ranking(kind));
                }
                Err(e) => debug!(kind = kind.as_str(), "Ranking request failed: {}", e),
            },

            Response::RankingHistory { symbol, result } => {
                let Some(detail) = self
                    .history
                    .as_mut()
                    .filter(|detail| detail.symbol == symbol)
                else {
                    debug!(%symbol, "Discarding ranking history nobody waits for");
                    return;
                };

                detail.loading = false;
                match result {
                    Ok(history) => detail.points = history_points(&history),
                    Err(e) => debug!(%symbol, "Ranking history request failed: {}", e),
                }
                self.view_bus.emit(&ViewChange::RankingHistory(symbol));
            }

            Response::PivotStatus(Ok(status)) => {
                self.pivot_status = Some(status);
                self.view_bus.emit(&ViewChange::PivotStatus);
            }
            Response::PivotStatus(Err(e)) => debug!("Pivot status request failed: {}", e),
        }
    }

    pub fn on_timer(&mut self, fired: Fired) {
        let Fired { handle, timer } = fired;
        match timer {
            Timer::Reconnect => {
                self.connection.on_timer(handle);
                self.publish_status();
            }
            Timer::LevelFetch => {
                let now = self.scheduler.now();
                let levels = &self.levels;
                let visibility = &self.visibility;
                let due = self.fetches.on_timer(
                    handle,
                    |key| visibility.is_visible(key),
                    |key| levels.is_fresh(key, now),
                );

                if !due.is_empty() {
                    debug!(count = due.len(), "Fetching levels for visible symbols");
                }
                for symbol in due {
                    self.backend.submit(Request::Levels { symbol });
                }
            }
            Timer::StatusPoll => {
                if self.status_timer != Some(handle) {
                    return;
                }
                self.backend.submit(Request::PivotStatus);
                self.status_timer = Some(
                    self.scheduler
                        .after(self.config.status_poll_interval, Timer::StatusPoll),
                );
            }
            Timer::RelativeTime => {
                if self.clock_timer != Some(handle) {
                    return;
                }
                self.emit_visible_rows();
                self.clock_timer = Some(
                    self.scheduler
                        .after(self.config.relative_time_interval, Timer::RelativeTime),
                );
            }
        }
    }

    // ========================================================================
    // User actions
    // ========================================================================

    pub fn set_filter_config(&mut self, config: FilterConfig) {
        self.pattern_filter.symbol_query = config.symbol_query.clone();
        self.filter = config;
        self.rederive_signals();
        self.rederive_patterns();
    }

    /// Change only the symbol query, shared by every tab.
    pub fn set_symbol_query(&mut self, query: &str) {
        let config = self.filter.clone().with_symbol_query(query);
        self.set_filter_config(config);
    }

    pub fn set_pattern_filter(&mut self, filter: PatternFilter) {
        self.pattern_filter = filter;
        self.rederive_patterns();
    }

    /// Apply persisted settings: store limit plus the signal filter.
    pub fn apply_settings(&mut self, settings: Settings) {
        self.signals.set_limit(settings.limit);
        self.signals.evict();
        let config = settings.filter_config(&self.filter.symbol_query);
        self.settings = settings;
        self.set_filter_config(config);
    }

    pub fn save_settings(&self, store: &mut impl KeyValueStore) -> Result<(), SettingsError> {
        self.settings.save(store)
    }

    pub fn set_tab(&mut self, tab: Tab) {
        if tab == self.tab {
            return;
        }
        self.tab = tab;

        // Start the new tab from the top
        self.list.reset_scroll();
        self.sync_rows();
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        if let Some(update) = self.list.set_viewport_height(height) {
            self.on_window(update);
        }
    }

    pub fn scroll_to(&mut self, scroll_top: u32) {
        if let Some(update) = self.list.scroll_to(scroll_top) {
            self.on_window(update);
        }
    }

    pub fn scroll_rows(&mut self, rows: i64) {
        if let Some(update) = self.list.scroll_rows(rows) {
            self.on_window(update);
        }
    }

    pub fn select_offset(&mut self, rows: i64) {
        if let Some(update) = self.list.select_offset(rows) {
            self.on_window(update);
        }
    }

    pub fn set_ranking_sort(&mut self, sort: RankingSort, order: SortOrder) {
        self.ranking.sort = sort;
        self.ranking.order = order;
        self.sync_rows();
        if let Some(kind) = self.tab.ranking_kind() {
            self.view_bus.emit(&ViewChange::Ranking(kind));
        }
    }

    pub fn set_compare_window(&mut self, compare: Option<CompareWindow>) {
        self.compare = compare;
        self.request_ranking(RankingKind::Volume);
        self.request_ranking(RankingKind::Trades);
    }

    /// Request the ranking history of `symbol`, replacing any open detail.
    pub fn request_ranking_history(&mut self, symbol: &str) {
        self.history = Some(RankingDetail {
            symbol: symbol.to_string(),
            loading: true,
            points: Vec::new(),
        });
        self.backend.submit(Request::RankingHistory {
            symbol: symbol.to_string(),
        });
    }

    pub fn close_ranking_history(&mut self) {
        self.history = None;
    }

    /// Show the level ladder of `symbol`, replacing any open one.
    ///
    /// Fresh cached levels are used as they are. Otherwise the levels are
    /// fetched right away, whether or not the symbol is on screen.
    pub fn open_level_detail(&mut self, symbol: &str) {
        let fresh = self.levels.is_fresh(symbol, self.scheduler.now());
        if !fresh && self.fetches.begin(symbol) {
            debug!(%symbol, "Fetching levels for detail");
            self.backend.submit(Request::Levels {
                symbol: symbol.to_string(),
            });
        }

        self.level_detail = Some(LevelDetail {
            symbol: symbol.to_string(),
            period: Period::Daily,
            loading: !fresh,
        });
        self.view_bus.emit(&ViewChange::LevelDetail(symbol.to_string()));
    }

    pub fn set_level_detail_period(&mut self, period: Period) {
        let Some(detail) = self.level_detail.as_mut() else {
            return;
        };
        if detail.period != period {
            detail.period = period;
            let symbol = detail.symbol.clone();
            self.view_bus.emit(&ViewChange::LevelDetail(symbol));
        }
    }

    pub fn close_level_detail(&mut self) {
        self.level_detail = None;
    }

    /// Show the pattern with record id `id`. Returns `false` if no such pattern is loaded.
    pub fn open_pattern_detail(&mut self, id: &str) -> bool {
        let found = self.pattern_view.records.iter().any(|pattern| pattern.id == id);
        if found {
            self.pattern_detail = Some(id.to_string());
        }
        found
    }

    pub fn close_pattern_detail(&mut self) {
        self.pattern_detail = None;
    }

    // ========================================================================
    // Views
    // ========================================================================

    pub fn view(&self) -> &SignalView {
        &self.signal_view
    }

    pub fn patterns(&self) -> &PatternView {
        &self.pattern_view
    }

    pub fn pattern_types(&self) -> Vec<String> {
        pattern_types(&self.pattern_view.records)
    }

    pub fn ranking_rows(&self, kind: RankingKind) -> Vec<RankingRow> {
        self.ranking
            .rows(kind, &self.signal_view.derived.ranks, &self.filter.symbol_query)
    }

    pub fn ranking_source(&self, kind: RankingKind) -> RankingSource {
        self.ranking.source(kind)
    }

    pub fn ranking(&self) -> &RankingView {
        &self.ranking
    }

    pub fn ranking_history(&self) -> Option<&RankingDetail> {
        self.history.as_ref()
    }

    pub fn level_detail(&self) -> Option<&LevelDetail> {
        self.level_detail.as_ref()
    }

    /// Ladder of the open level detail for its period, around the last price.
    /// Empty while loading or when the symbol has no levels for that period.
    pub fn level_detail_ladder(&self) -> Vec<LadderRow> {
        let Some(detail) = &self.level_detail else {
            return Vec::new();
        };
        let price = self
            .tickers
            .get(&detail.symbol)
            .map_or(0.0, |ticker| ticker.last_price);

        self.levels(&detail.symbol)
            .and_then(|levels| levels.get(detail.period))
            .map(|set| level_ladder(set, price))
            .unwrap_or_default()
    }

    /// Pattern of the open pattern detail, the latest version of that record.
    pub fn pattern_detail(&self) -> Option<&Pattern> {
        let id = self.pattern_detail.as_deref()?;
        self.pattern_view
            .records
            .iter()
            .find(|pattern| pattern.id == id)
    }

    pub fn pivot_status(&self) -> Option<&PivotStatusResponse> {
        self.pivot_status.as_ref()
    }

    pub fn tickers(&self) -> &TickerMap {
        &self.tickers
    }

    pub fn ticker(&self, symbol: &str) -> Option<&TickerSnapshot> {
        self.tickers.get(symbol)
    }

    /// Fresh cached levels. Never fetches.
    pub fn levels(&self, symbol: &str) -> Option<&PivotLevels> {
        self.levels.get(symbol, self.scheduler.now())
    }

    /// Levels around the last price of `symbol`, empty without fresh levels or a ticker.
    pub fn nearest_levels(&self, symbol: &str) -> Vec<NearestLevels> {
        match (self.levels(symbol), self.tickers.get(symbol)) {
            (Some(levels), Some(ticker)) => nearest_for(levels, ticker.last_price),
            _ => Vec::new(),
        }
    }

    pub fn filter_config(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn pattern_filter(&self) -> &PatternFilter {
        &self.pattern_filter
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn list(&self) -> &VirtualList {
        &self.list
    }

    /// Key of the selected row of the current tab.
    pub fn selected_symbol(&self) -> Option<&str> {
        self.list.key(self.list.selected()?)
    }

    /// Record id of the selected row of the current tab.
    pub fn selected_id(&self) -> Option<&str> {
        self.list.id(self.list.selected()?)
    }

    pub fn is_fetch_pending(&self, symbol: &str) -> bool {
        self.fetches.is_pending(symbol)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.scheduler.now()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn apply_push(&mut self, event: PushEvent) {
        match event {
            PushEvent::Signal(mut signal) => {
                let patterns = self.patterns.snapshot();
                associate(&mut signal, &patterns);
                if self.signals.merge(signal).changed() {
                    self.rederive_signals();
                }
            }
            PushEvent::Pattern(pattern) => {
                let symbol = pattern.symbol.clone();
                if self.patterns.merge(pattern).changed() {
                    self.rederive_patterns();
                    self.associate_signals(Some(&symbol));
                }
            }
            PushEvent::TickerBatch(tickers) => self.merge_tickers(tickers),
        }
    }

    /// Attach patterns to stored signals that have none, optionally only for `symbol`.
    fn associate_signals(&mut self, symbol: Option<&str>) {
        let patterns = self.patterns.snapshot();
        let updated = self
            .signals
            .snapshot()
            .iter()
            .filter(|signal| signal.related_pattern.is_none())
            .filter(|signal| symbol.is_none_or(|symbol| signal.symbol == symbol))
            .filter_map(|signal| {
                let mut signal = signal.clone();
                associate(&mut signal, &patterns).then_some(signal)
            })
            .collect::<Vec<_>>();

        if !updated.is_empty() && self.signals.merge_batch(updated) > 0 {
            self.rederive_signals();
        }
    }

    fn merge_tickers(&mut self, tickers: TickerMap) {
        if tickers.is_empty() {
            return;
        }
        let detail = self
            .level_detail
            .as_ref()
            .filter(|detail| tickers.contains_key(&detail.symbol))
            .map(|detail| detail.symbol.clone());
        self.tickers.extend(tickers);

        if !self.rederive_signals() {
            self.emit_visible_rows();
        }
        if let Some(symbol) = detail {
            self.view_bus.emit(&ViewChange::LevelDetail(symbol));
        }
    }

    /// Recompute the filtered signals. Returns `true` if the row list changed.
    fn rederive_signals(&mut self) -> bool {
        let records = self.signals.snapshot();
        let version = self.signals.version();
        let derived = derive(&records, &self.tickers, &self.filter);

        let changed = version != self.signal_view.version
            || derived.filtered != self.signal_view.derived.filtered;
        self.signal_view = SignalView {
            records,
            derived,
            version,
        };
        self.sync_rows();

        if changed {
            self.view_bus.emit(&ViewChange::Signals);
        }
        changed
    }

    fn rederive_patterns(&mut self) {
        let records = self.patterns.snapshot();
        let filtered = derive_patterns(&records, &self.pattern_filter);
        self.pattern_view = PatternView { records, filtered };
        self.sync_rows();
        self.view_bus.emit(&ViewChange::Patterns);
    }

    /// Rows of the current tab: record id plus the symbol used for visibility.
    fn list_rows(&self) -> Vec<ListRow> {
        match self.tab.ranking_kind() {
            Some(kind) => self
                .ranking_rows(kind)
                .into_iter()
                .map(|row| ListRow::new(row.symbol.clone(), row.symbol))
                .collect(),
            None if self.tab == Tab::Patterns => self
                .pattern_view
                .iter()
                .map(|pattern| ListRow::new(pattern.id.clone(), pattern.symbol.clone()))
                .collect(),
            None => self
                .signal_view
                .iter()
                .map(|signal| ListRow::new(signal.id.clone(), signal.symbol.clone()))
                .collect(),
        }
    }

    fn sync_rows(&mut self) {
        let rows = self.list_rows();
        if let Some(update) = self.list.set_rows(rows) {
            self.on_window(update);
        }
    }

    fn on_window(&mut self, update: WindowUpdate) {
        self.rows_bus.emit(&update);

        let keys = if self.tab.decorated() {
            update.keys
        } else {
            Vec::new()
        };
        let change = self.visibility.observe(&keys);
        if change.is_empty() {
            return;
        }

        let now = self.scheduler.now();
        let levels = &self.levels;
        self.fetches
            .on_visibility(&change, |key| levels.is_fresh(key, now), &mut self.scheduler);
    }

    fn emit_visible_rows(&mut self) {
        let keys = self
            .list
            .materialized_keys()
            .into_iter()
            .unique()
            .collect::<Vec<_>>();
        if !keys.is_empty() {
            self.view_bus.emit(&ViewChange::Rows(keys));
        }
    }

    fn request_ranking(&mut self, kind: RankingKind) {
        self.backend.submit(Request::Ranking {
            kind,
            limit: self.config.ranking_limit,
            compare: self.compare,
        });
    }

    fn publish_status(&mut self) {
        for status in self.connection.drain_transitions() {
            self.status_bus.emit(&status);
        }
    }
}

impl<C, B> Dashboard<ManualScheduler, C, B>
where
    C: StreamClient,
    B: Backend,
{
    /// Move virtual time forward by `by`, handling every timer that comes due,
    /// including timers scheduled while handling earlier ones.
    pub fn advance(&mut self, by: Duration) {
        let until = self.scheduler.now() + delta(by);
        while let Some(fired) = self.scheduler.next_due(until) {
            self.on_timer(fired);
        }
        self.scheduler.set_now(until);
    }
}
