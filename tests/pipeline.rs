// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline tests: table blob in shared memory, spikes in,
//! flushed ring-buffer slices and provenance out.

use std::sync::Arc;

use synfire::config::SynfireConfig;
use synfire::core::row::codec::{ControlWord, FixedSynapse};
use synfire::core::row::RowBuilder;
use synfire::core::{RowGeometry, SpikeKey, SynapticRowView};
use synfire::engine::{
    pair_rule_from_config, shared_sdram, AddressListEntry, DmaScheduler, HostDma, ManualTimer,
    PopulationTable, PopulationTableEntry, SharedSdram, SpikeQueue,
};
use synfire::plasticity::PairRule;

const FLUSH_ADDRESS: u32 = 0x4000;
const BUDGET: u32 = 10_000;

fn geometry() -> RowGeometry {
    RowGeometry::new(4, 1, 8).unwrap()
}

fn config() -> SynfireConfig {
    let mut config = SynfireConfig::default();
    config.flush.output_address = FLUSH_ADDRESS;
    config.queue.capacity = 1024;
    // Potentiation-dominant STDP keeps the pairing tests' direction clear.
    config.plasticity.a2_plus = 400;
    config.plasticity.a2_minus = 100;
    config
}

struct Fixture {
    scheduler: DmaScheduler<PairRule, HostDma, ManualTimer>,
    queue: Arc<SpikeQueue>,
    sdram: SharedSdram,
    plastic_base: usize,
}

/// Two populations: 0x1000 maps to a static row of two synapses, 0x2000 to
/// one plastic synapse onto neuron 7 (delay 1).
fn fixture(plastic: bool) -> Fixture {
    let g = geometry();
    let config = config();

    let static_row = RowBuilder::new()
        .fixed_word(FixedSynapse { weight: 250, delay: 2, synapse_type: 0, index: 5 }.encode(&g))
        .fixed_word(FixedSynapse { weight: 80, delay: 9, synapse_type: 0, index: 30 }.encode(&g))
        .build();
    let plastic_builder = RowBuilder::new().plastic_synapse(
        ControlWord { delay: 1, synapse_type: 0, index: 7 }.encode(&g),
        600,
    );
    let plastic_length = plastic_builder.row_length();
    let plastic_row = plastic_builder.build();

    // Static row at offset 0, plastic row 16-byte-aligned after it.
    let plastic_units = static_row.len().div_ceil(16) as u32;
    let mut memory = vec![0u8; 0x8000];
    memory[..static_row.len()].copy_from_slice(&static_row);
    let plastic_base = plastic_units as usize * 16;
    memory[plastic_base..plastic_base + plastic_row.len()].copy_from_slice(&plastic_row);
    let sdram = shared_sdram(memory);

    let entry = |key, start_index| PopulationTableEntry {
        key,
        mask: 0xFFFF_FF00,
        start_index,
        count: 1,
        core_mask: 0,
        mask_shift: 0,
        n_neurons: 256,
        n_words: 8,
        extra_info: false,
    };
    let table = PopulationTable::new(
        vec![entry(0x1000, 0), entry(0x2000, 1)],
        vec![
            AddressListEntry {
                row_length: (static_row.len() / 4 - 3) as u8,
                address_offset: 0,
                is_single: false,
            },
            AddressListEntry {
                row_length: plastic_length as u8,
                address_offset: plastic_units,
                is_single: false,
            },
        ],
    )
    .unwrap();

    let queue = Arc::new(SpikeQueue::new(config.queue.capacity).unwrap());
    let dma = HostDma::new(sdram.clone(), config.dma.row_buffer_words);
    let rule = plastic.then(|| pair_rule_from_config(&config.plasticity).unwrap());
    let scheduler =
        DmaScheduler::new(&config, table, queue.clone(), dma, ManualTimer::new(), rule).unwrap();
    Fixture { scheduler, queue, sdram, plastic_base }
}

fn flushed_slice(sdram: &SharedSdram) -> Vec<u16> {
    let memory = sdram.read();
    let base = FLUSH_ADDRESS as usize;
    (0..geometry().slice_len())
        .map(|i| u16::from_le_bytes([memory[base + i * 2], memory[base + i * 2 + 1]]))
        .collect()
}

#[test]
fn spike_to_flush_round_trip() {
    let mut f = fixture(false);

    f.queue.push(SpikeKey(0x1005));
    let summary = f.scheduler.run_timestep(0, BUDGET).unwrap();
    assert_eq!(summary.spikes_delivered, 1);
    assert_eq!(summary.rows_fetched, 1);

    // Delay 2 lands in the slice flushed at t=2.
    f.scheduler.run_timestep(1, BUDGET).unwrap();
    assert!(flushed_slice(&f.sdram).iter().all(|&w| w == 0));
    f.scheduler.run_timestep(2, BUDGET).unwrap();
    let slice = flushed_slice(&f.sdram);
    assert_eq!(slice[5], 250);
    assert_eq!(slice.iter().filter(|&&w| w != 0).count(), 1);

    // Delay 9 lands at t=9, and the slice was cleared when drained.
    for t in 3..=9 {
        f.scheduler.run_timestep(t, BUDGET).unwrap();
    }
    let slice = flushed_slice(&f.sdram);
    assert_eq!(slice[30], 80);
    assert_eq!(slice[5], 0, "drained slots must be cleared");

    let counters = f.scheduler.counters();
    assert_eq!(counters.spikes_processed, 1);
    assert_eq!(counters.dropped_at_deadline, 0);
    assert_eq!(counters.ring_buffer_saturations, 0);
}

#[test]
fn repeated_delivery_saturates_and_counts() {
    let mut f = fixture(false);

    // 250 per spike within one timestep: 300 spikes exceed u16::MAX in the
    // delay-2 slot.
    for _ in 0..300 {
        assert!(f.queue.push(SpikeKey(0x1005)));
    }
    f.scheduler.run_timestep(0, BUDGET).unwrap();
    f.scheduler.run_timestep(1, BUDGET).unwrap();
    f.scheduler.run_timestep(2, BUDGET).unwrap();
    let slice = flushed_slice(&f.sdram);
    assert_eq!(slice[5], u16::MAX, "accumulation clamps instead of wrapping");
    assert!(f.scheduler.counters().ring_buffer_saturations > 0);
}

#[test]
fn plastic_round_trip_updates_row_in_memory() {
    let mut f = fixture(true);

    // Pre at t=1, post at t=3, pre at t=6: the second fetch sees the post
    // spike and potentiates.
    f.queue.push(SpikeKey(0x2000));
    f.scheduler.run_timestep(1, BUDGET).unwrap();
    f.scheduler.record_post_spike(7, 3).unwrap();
    f.scheduler.run_timestep(2, BUDGET).unwrap();
    f.queue.push(SpikeKey(0x2000));
    f.scheduler.run_timestep(6, BUDGET).unwrap();

    // Read the row back out of shared memory.
    let g = geometry();
    let plastic_builder = RowBuilder::new()
        .plastic_synapse(ControlWord { delay: 1, synapse_type: 0, index: 7 }.encode(&g), 600);
    let row_bytes = (plastic_builder.row_length() + 3) * 4;
    let memory = f.sdram.read().clone();
    let base = f.plastic_base;
    let view = SynapticRowView::new(&memory[base..base + row_bytes]).unwrap();
    let history = view.pre_history().unwrap();
    assert_eq!(history.times(), &[1, 6], "both pre spikes recorded");
    assert!(view.plastic_weight(0) > 600, "pre-post pairing potentiates");

    let counters = f.scheduler.counters();
    assert_eq!(counters.spikes_processed, 2);
    assert_eq!(counters.plastic_weight_saturations, 0);
}

#[test]
fn unknown_and_known_keys_mix_cleanly() {
    let mut f = fixture(false);
    f.queue.push(SpikeKey(0xDEAD_0000));
    f.queue.push(SpikeKey(0x1005));
    f.queue.push(SpikeKey(0x0BAD_0000));
    let summary = f.scheduler.run_timestep(0, BUDGET).unwrap();
    assert_eq!(summary.spikes_delivered, 1);
    let counters = f.scheduler.counters();
    assert_eq!(counters.invalid_master_pop_hits, 2);
    assert_eq!(counters.spikes_processed, 1);
}
