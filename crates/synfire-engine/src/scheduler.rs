// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The DMA scheduler: spike in, ring-buffer contribution out.
//!
//! One instance pumps the spike queue for one core. Each queued spike is
//! resolved through the population table, its row fetched into one of two
//! ping-pong buffers, decoded, and accumulated into the ring buffer; plastic
//! rows additionally run the deferred weight update and write their modified
//! plastic region back. The pump runs against a per-timestep tick budget and
//! preempts itself early enough to flush the ring-buffer front slice before
//! the neuron stage needs it.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use synfire_core::event_history::{EventHistory, HistoryError};
use synfire_core::ring_buffer::RingBuffer;
use synfire_core::row::codec::{ring_buffer_offset, ControlWord, FixedSynapse};
use synfire_core::row::{RowError, SynapticRowView, SynapticRowViewMut};
use synfire_core::types::{GeometryError, RowGeometry, SpikeKey};
use synfire_config::{DeadlinePolicy, PlasticityConfig, SynfireConfig, WeightDependenceMode};
use synfire_plasticity::{
    deferred_weight_update, AdditiveWeightDependence, PairRule, PairRuleConfig, PlasticityError,
    PlasticityRule, WeightDependenceRecord,
};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::bitfield::{ConnectivityBitfields, DtcmBudget};
use crate::dma::{DmaChannel, DmaError, RowBufferId, Timeout};
use crate::population_table::{LookupResult, PopulationTable, RowFetch, TableError};
use crate::provenance::ProvenanceCounters;
use crate::rewiring::{RewiringRequest, RewiringTrigger};
use crate::spike_queue::{QueueError, SpikeQueue};
use crate::timer::FreeRunningTimer;

/// Post-synaptic event history depth per local neuron.
pub const POST_HISTORY_CAPACITY: usize = 16;

/// Default fast-memory allowance for connectivity bitfields, in bytes.
const DEFAULT_BITFIELD_BUDGET: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Dma(#[from] DmaError),
    #[error(transparent)]
    Row(#[from] RowError),
    #[error(transparent)]
    Plasticity(#[from] PlasticityError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("post-synaptic index {index} outside the {len} local neurons")]
    PostIndexOutOfRange { index: usize, len: usize },
    #[error("address list row of {row_bytes} bytes exceeds the {capacity} byte row buffer")]
    RowExceedsBuffer { row_bytes: usize, capacity: usize },
    #[error("flush slice of {slice_bytes} bytes exceeds the {capacity} byte row buffer")]
    FlushExceedsBuffer { slice_bytes: usize, capacity: usize },
}

/// Lifecycle of the row pipeline within a continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A fetch is in flight into the current buffer.
    Filling,
    /// The fetch completed; the buffer holds an undecoded row.
    Ready,
    /// The row is being decoded and delivered.
    Processing,
    /// The modified plastic region is being written back.
    WritebackPending,
}

/// What one `run_timestep` call accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestepSummary {
    pub time: u32,
    pub rows_fetched: u64,
    pub spikes_delivered: u64,
    /// Spikes merged into an already-scheduled fetch of the same row.
    pub coalesced: u64,
    /// The pump hit its flush deadline before the queue drained.
    pub preempted: bool,
    /// Spikes discarded by the drop-at-deadline policy this step.
    pub dropped: u64,
}

/// A row fetch with the spikes it will deliver for.
#[derive(Debug, Clone, Copy)]
struct RowWork {
    key: SpikeKey,
    fetch: RowFetch,
    multiplicity: u32,
    /// Spikes this fetch accounts for. The trailing fetches of a
    /// multi-address hit carry 0 so a fanned-out spike is counted once.
    spikes: u32,
}

pub struct DmaScheduler<R, D, T>
where
    R: PlasticityRule<PreTrace = u16, PostTrace = u16>,
    D: DmaChannel,
    T: FreeRunningTimer,
{
    geometry: RowGeometry,
    table: PopulationTable,
    bitfields: ConnectivityBitfields,
    bitfield_budget: DtcmBudget,
    queue: Arc<SpikeQueue>,
    dma: D,
    timer: T,
    timeout: Timeout,
    // Interrupt-masked critical section analog: flush and accumulation take
    // the same lock.
    ring: Mutex<RingBuffer>,
    plasticity: Option<R>,
    post_histories: Vec<EventHistory<u16, POST_HISTORY_CAPACITY>>,
    rewiring: Option<(Receiver<RewiringRequest>, Box<dyn RewiringTrigger + Send>)>,
    state: SchedulerState,
    current: RowBufferId,
    /// Work popped from the queue but not yet fetched (carry-over and the
    /// trailing fetches of multi-address hits).
    pending: VecDeque<RowWork>,
    staged: Option<RowWork>,
    deadline_policy: DeadlinePolicy,
    flush_overhead_ticks: u32,
    flush_address: u32,
    flush_cost: Option<u32>,
    flush_scratch: Vec<u16>,
    counters: ProvenanceCounters,
}

impl<R, D, T> std::fmt::Debug for DmaScheduler<R, D, T>
where
    R: PlasticityRule<PreTrace = u16, PostTrace = u16>,
    D: DmaChannel,
    T: FreeRunningTimer,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaScheduler")
            .field("geometry", &self.geometry)
            .field("state", &self.state)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl<R, D, T> DmaScheduler<R, D, T>
where
    R: PlasticityRule<PreTrace = u16, PostTrace = u16>,
    D: DmaChannel,
    T: FreeRunningTimer,
{
    pub fn new(
        config: &SynfireConfig,
        table: PopulationTable,
        queue: Arc<SpikeQueue>,
        dma: D,
        timer: T,
        plasticity: Option<R>,
    ) -> Result<Self, SchedulerError> {
        let geometry = RowGeometry::new(
            config.geometry.delay_bits,
            config.geometry.type_bits,
            config.geometry.index_bits,
        )?;
        let n_neurons = 1usize << geometry.index_bits();
        let ring = RingBuffer::new(geometry);
        let flush_scratch = vec![0u16; geometry.slice_len()];
        // Every transfer through the ping-pong buffers must fit: the rows
        // the table can name, and the flushed front slice.
        let capacity = dma.buffer(RowBufferId::A).len();
        let row_bytes = table.max_row_bytes();
        if row_bytes > capacity {
            return Err(SchedulerError::RowExceedsBuffer { row_bytes, capacity });
        }
        let slice_bytes = geometry.slice_len() * 2;
        if slice_bytes > capacity {
            return Err(SchedulerError::FlushExceedsBuffer { slice_bytes, capacity });
        }
        Ok(Self {
            geometry,
            table,
            bitfields: ConnectivityBitfields::new(),
            bitfield_budget: DtcmBudget::new(DEFAULT_BITFIELD_BUDGET),
            queue,
            dma,
            timer,
            timeout: Timeout::new(config.dma.poll_limit),
            ring: Mutex::new(ring),
            plasticity,
            post_histories: (0..n_neurons).map(|_| EventHistory::new()).collect(),
            rewiring: None,
            state: SchedulerState::Idle,
            current: RowBufferId::A,
            pending: VecDeque::new(),
            staged: None,
            deadline_policy: config.queue.deadline_policy,
            flush_overhead_ticks: config.flush.overhead_ticks,
            flush_address: config.flush.output_address,
            flush_cost: None,
            flush_scratch,
            counters: ProvenanceCounters::default(),
        })
    }

    pub fn geometry(&self) -> &RowGeometry {
        &self.geometry
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Install a connectivity bitfield for one table entry. Failure is the
    /// degraded mode: the entry just loses its pre-filter.
    pub fn install_bitfield(&mut self, entry_index: usize, words: Vec<u32>) -> bool {
        self.bitfields.install(entry_index, words, &mut self.bitfield_budget)
    }

    /// Attach the structural-rewiring request channel and its policy.
    pub fn set_rewiring(
        &mut self,
        requests: Receiver<RewiringRequest>,
        trigger: Box<dyn RewiringTrigger + Send>,
    ) {
        self.rewiring = Some((requests, trigger));
    }

    /// Record a firing of the local neuron at `index`, growing its
    /// post-synaptic trace. Called by the neuron stage once per own spike.
    pub fn record_post_spike(&mut self, index: usize, time: u32) -> Result<(), SchedulerError> {
        let Some(rule) = &self.plasticity else {
            return Ok(());
        };
        let len = self.post_histories.len();
        let history = self
            .post_histories
            .get_mut(index)
            .ok_or(SchedulerError::PostIndexOutOfRange { index, len })?;
        let (last_time, last_trace) = match history.last() {
            Some((t, trace)) => (t, *trace),
            None => (0, rule.initial_post_trace()),
        };
        let trace = rule.add_post_spike(time, last_time, last_trace);
        history.push(time, trace)?;
        Ok(())
    }

    /// Pump the spike queue for timestep `time` within `budget_ticks` of the
    /// free-running timer, then flush the ring-buffer front slice.
    pub fn run_timestep(
        &mut self,
        time: u32,
        budget_ticks: u32,
    ) -> Result<TimestepSummary, SchedulerError> {
        let started = self.timer.ticks();
        if self.flush_cost.is_none() {
            self.measure_flush_cost(time)?;
        }
        // flush_cost is always Some after the measurement above.
        let flush_cost = self.flush_cost.unwrap_or(self.flush_overhead_ticks);

        self.drain_rewiring();

        let mut summary = TimestepSummary {
            time,
            rows_fetched: 0,
            spikes_delivered: 0,
            coalesced: 0,
            preempted: false,
            dropped: 0,
        };

        loop {
            let elapsed = self.timer.ticks().wrapping_sub(started);
            if budget_ticks.saturating_sub(elapsed) < flush_cost {
                summary.preempted = true;
                break;
            }
            let Some(work) = self.acquire_work(&mut summary) else {
                break;
            };
            if work.fetch.is_single {
                self.process_direct(&work, time, &mut summary)?;
                continue;
            }
            self.state = SchedulerState::Filling;
            self.dma
                .start_read(self.current, work.fetch.row_address, work.fetch.row_bytes)?;
            self.dma.complete(&self.timeout)?;
            self.counters.dma_completes += 1;
            self.state = SchedulerState::Ready;
            self.process_row(self.current, &work, time, &mut summary)?;
            summary.rows_fetched += 1;
            self.current = self.current.other();
            self.state = SchedulerState::Idle;
        }

        if summary.preempted {
            self.dma.cancel();
            self.state = SchedulerState::Idle;
            if self.deadline_policy == DeadlinePolicy::Drop {
                let mut dropped = self.staged.take().map_or(0, |w| w.spikes as u64);
                dropped += self
                    .pending
                    .drain(..)
                    .map(|w| w.spikes as u64)
                    .sum::<u64>();
                dropped += self.queue.drain();
                self.counters.dropped_at_deadline += dropped;
                summary.dropped = dropped;
                debug!(time, dropped, "deadline reached, queue dropped");
            } else {
                trace!(time, "deadline reached, queue carried over");
            }
        }

        self.flush(time)?;
        Ok(summary)
    }

    /// One-time timed flush to learn what the end-of-step transfer costs.
    /// Runs before any spikes are delivered, so it only moves zeros.
    fn measure_flush_cost(&mut self, time: u32) -> Result<(), SchedulerError> {
        let t0 = self.timer.ticks();
        self.flush(time)?;
        let cost = self
            .timer
            .ticks()
            .wrapping_sub(t0)
            .saturating_add(self.flush_overhead_ticks);
        info!(cost, "measured flush cost");
        self.flush_cost = Some(cost);
        Ok(())
    }

    /// Next row to fetch, with consecutive spikes for the same row merged
    /// into one fetch. Lookup misses are counted and consumed here.
    fn acquire_work(&mut self, summary: &mut TimestepSummary) -> Option<RowWork> {
        let mut work = match self.staged.take() {
            Some(w) => w,
            None => self.next_work()?,
        };
        if !work.fetch.is_single {
            while let Some(next) = self.next_work() {
                if !next.fetch.is_single && next.fetch.row_address == work.fetch.row_address {
                    work.multiplicity += next.multiplicity;
                    work.spikes += next.spikes;
                    summary.coalesced += next.multiplicity as u64;
                } else {
                    self.staged = Some(next);
                    break;
                }
            }
        }
        Some(work)
    }

    fn next_work(&mut self) -> Option<RowWork> {
        if let Some(work) = self.pending.pop_front() {
            return Some(work);
        }
        loop {
            let spike = self.queue.pop()?;
            match self.table.lookup(spike, &self.bitfields) {
                LookupResult::Hit(hit) => {
                    // Trailing fetches of a multi-address hit queue behind
                    // the first.
                    for fetch in self.table.address_fetches(hit.entry_index).skip(1) {
                        self.pending.push_back(RowWork {
                            key: spike,
                            fetch,
                            multiplicity: 1,
                            spikes: 0,
                        });
                    }
                    return Some(RowWork {
                        key: spike,
                        fetch: hit.fetch,
                        multiplicity: 1,
                        spikes: 1,
                    });
                }
                LookupResult::Filtered => {
                    self.counters.bitfield_filtered_packets += 1;
                }
                LookupResult::NotFound => {
                    self.counters.invalid_master_pop_hits += 1;
                    debug!(spike = %spike, "spike matched no table entry");
                }
            }
        }
    }

    /// A single-synapse row: one word read inline, no DMA round trip.
    fn process_direct(
        &mut self,
        work: &RowWork,
        time: u32,
        summary: &mut TimestepSummary,
    ) -> Result<(), SchedulerError> {
        let word = self.dma.read_word(work.fetch.row_address)?;
        let synapse = FixedSynapse::decode(word, &self.geometry);
        let offset = ring_buffer_offset(
            &self.geometry,
            synapse.delay,
            time,
            synapse.synapse_type,
            synapse.index,
        );
        let mut ring = self.ring.lock();
        for _ in 0..work.multiplicity {
            ring.add(offset, synapse.weight);
        }
        drop(ring);
        self.counters.spikes_processed += work.spikes as u64;
        summary.spikes_delivered += work.spikes as u64;
        Ok(())
    }

    /// Decode and deliver the row sitting in `buffer`, then write back the
    /// plastic region if it changed.
    fn process_row(
        &mut self,
        buffer: RowBufferId,
        work: &RowWork,
        time: u32,
        summary: &mut TimestepSummary,
    ) -> Result<(), SchedulerError> {
        self.state = SchedulerState::Processing;
        let row_bytes = work.fetch.row_bytes;
        let view = SynapticRowView::new(&self.dma.buffer(buffer)[..row_bytes])?;

        if view.fixed_count() == 0 && view.control_count() == 0 {
            // A structurally present but empty row: the table matched, the
            // fetch happened, nothing was delivered.
            self.counters.ghost_pop_table_searches += work.multiplicity as u64;
            trace!(key = %work.key, "ghost row");
            return Ok(());
        }

        {
            let mut ring = self.ring.lock();
            for _ in 0..work.multiplicity {
                for i in 0..view.fixed_count() {
                    let synapse = FixedSynapse::decode(view.fixed_word(i), &self.geometry);
                    let offset = ring_buffer_offset(
                        &self.geometry,
                        synapse.delay,
                        time,
                        synapse.synapse_type,
                        synapse.index,
                    );
                    ring.add(offset, synapse.weight);
                }
            }
        }

        let mut writeback = None;
        if view.control_count() > 0 {
            if let Some(rule) = &self.plasticity {
                let mut pre_history = view.pre_history()?;
                let last_update = pre_history.last_time();
                // The spikes being delivered join the history first so the
                // merge walk applies them against the post traces.
                for _ in 0..work.multiplicity {
                    let (last_time, last_trace) = match pre_history.last() {
                        Some((t, trace)) => (t, *trace),
                        None => (0, rule.initial_pre_trace()),
                    };
                    let trace = rule.add_pre_spike(time, last_time, last_trace);
                    pre_history.push(time, trace)?;
                }
                let mut new_weights = Vec::with_capacity(view.control_count());
                let mut ring = self.ring.lock();
                for i in 0..view.control_count() {
                    let control = ControlWord::decode(view.control_half_word(i), &self.geometry);
                    let post_history = &self.post_histories[control.index as usize];
                    let update = deferred_weight_update(
                        rule,
                        &pre_history,
                        post_history,
                        last_update,
                        time,
                        view.plastic_weight(i),
                    );
                    if update.saturated {
                        self.counters.plastic_weight_saturations += 1;
                    }
                    let offset = ring_buffer_offset(
                        &self.geometry,
                        control.delay,
                        time,
                        control.synapse_type,
                        control.index,
                    );
                    for _ in 0..work.multiplicity {
                        ring.add(offset, update.weight);
                    }
                    new_weights.push(update.weight);
                }
                drop(ring);
                writeback = Some((pre_history, new_weights));
            } else {
                // Plasticity disabled: the stored weights deliver statically
                // and the row is never written back.
                let mut ring = self.ring.lock();
                for _ in 0..work.multiplicity {
                    for i in 0..view.control_count() {
                        let control =
                            ControlWord::decode(view.control_half_word(i), &self.geometry);
                        let offset = ring_buffer_offset(
                            &self.geometry,
                            control.delay,
                            time,
                            control.synapse_type,
                            control.index,
                        );
                        ring.add(offset, view.plastic_weight(i));
                    }
                }
            }
        }

        self.counters.spikes_processed += work.spikes as u64;
        summary.spikes_delivered += work.spikes as u64;

        if let Some((pre_history, new_weights)) = writeback {
            let mut row = SynapticRowViewMut::new(&mut self.dma.buffer_mut(buffer)[..row_bytes])?;
            for (i, weight) in new_weights.iter().enumerate() {
                row.set_plastic_weight(i, *weight);
            }
            row.set_pre_history(&pre_history);
            let range = row.plastic_range_bytes();
            self.state = SchedulerState::WritebackPending;
            self.dma.start_write(
                buffer,
                work.fetch.row_address + range.start as u32,
                range.end - range.start,
            )?;
            self.dma.complete(&self.timeout)?;
            self.counters.dma_completes += 1;
        }
        Ok(())
    }

    /// Transfer and clear the front ring-buffer slice for `time`.
    fn flush(&mut self, time: u32) -> Result<(), SchedulerError> {
        {
            let mut ring = self.ring.lock();
            ring.drain_front_slice(time, &mut self.flush_scratch);
        }
        let buffer = self.dma.buffer_mut(self.current);
        for (i, weight) in self.flush_scratch.iter().enumerate() {
            buffer[i * 2..i * 2 + 2].copy_from_slice(&weight.to_le_bytes());
        }
        let bytes = self.flush_scratch.len() * 2;
        self.dma.start_write(self.current, self.flush_address, bytes)?;
        self.dma.complete(&self.timeout)?;
        self.counters.dma_completes += 1;
        Ok(())
    }

    fn drain_rewiring(&mut self) {
        let Some((requests, trigger)) = self.rewiring.as_mut() else {
            return;
        };
        while let Ok(request) = requests.try_recv() {
            if trigger.attempt(request) {
                self.counters.successful_rewires += 1;
            }
        }
    }

    /// Counter snapshot, folding in the counts owned by the queue and the
    /// ring buffer.
    pub fn counters(&self) -> ProvenanceCounters {
        let mut counters = self.counters.clone();
        counters.input_buffer_overflows = self.queue.overflow_count();
        counters.ring_buffer_saturations = self.ring.lock().saturation_count();
        counters
    }
}

/// Build the exemplar pair-based STDP rule from configuration, selecting
/// between the two historical weight-dependence loaders. The per-type loader
/// wraps the configured bounds into a one-record array for synapse type 0.
pub fn pair_rule_from_config(config: &PlasticityConfig) -> Result<PairRule, PlasticityError> {
    let record = WeightDependenceRecord {
        min_weight: config.min_weight,
        max_weight: config.max_weight,
        a2_plus: config.a2_plus,
        a2_minus: config.a2_minus,
    };
    let dependence = match config.weight_dependence {
        WeightDependenceMode::PerType => {
            AdditiveWeightDependence::from_per_type_records(std::slice::from_ref(&record), 0)?
        }
        WeightDependenceMode::Global => AdditiveWeightDependence::from_global_record(record)?,
    };
    Ok(PairRule::new(
        PairRuleConfig {
            tau_plus: config.tau_plus,
            tau_minus: config.tau_minus,
            lut_time_shift: config.lut_time_shift,
        },
        dependence,
    ))
}
