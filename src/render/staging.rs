use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use super::vertex::ChartVertex;

/// Which slot a frame writes to. Advances once per submitted frame.
#[derive(Debug, Clone, Copy)]
pub struct SlotRotation {
    frame: u64,
    slots: usize,
}

impl SlotRotation {
    pub fn new(slots: usize) -> Self {
        assert!(slots >= 2, "need at least two staging slots");
        Self { frame: 0, slots }
    }

    pub fn current(&self) -> usize {
        (self.frame % self.slots as u64) as usize
    }

    pub fn advance(&mut self) {
        self.frame += 1;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Ownership of a staging buffer between CPU and GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SlotState {
    /// Mapped and writable by the CPU.
    Mapped = 0,
    /// Unmapped and submitted, remap pending.
    InFlight = 1,
    /// Remap request failed; will be retried on the slot's next turn.
    Failed = 2,
}

impl SlotState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Mapped,
            1 => Self::InFlight,
            _ => Self::Failed,
        }
    }
}

/// What the frame may do with its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTurn {
    /// Slot is mapped; write into it.
    Write(usize),
    /// Transfer still pending; skip this frame.
    Busy,
    /// Last remap failed; request it again and skip this frame.
    Remap(usize),
}

/// Device-free bookkeeping for the staging ring: per-slot state, rotation
/// and the skipped-frame counter.
///
/// States are shared with map callbacks, which only ever move a slot from
/// `InFlight` to `Mapped` or `Failed`.
pub struct SlotTable {
    states: Vec<Arc<AtomicU8>>,
    rotation: SlotRotation,
    skipped_frames: u64,
}

impl SlotTable {
    /// All slots start mapped.
    pub fn new(slots: usize) -> Self {
        Self {
            states: (0..slots)
                .map(|_| Arc::new(AtomicU8::new(SlotState::Mapped as u8)))
                .collect(),
            rotation: SlotRotation::new(slots),
            skipped_frames: 0,
        }
    }

    pub fn state(&self, idx: usize) -> SlotState {
        SlotState::from_u8(self.states[idx].load(Ordering::Acquire))
    }

    pub fn current_state(&self) -> SlotState {
        self.state(self.rotation.current())
    }

    /// Decide this frame's turn. Only a `Mapped` slot is ever handed out.
    pub fn acquire(&mut self) -> SlotTurn {
        let idx = self.rotation.current();
        match self.state(idx) {
            SlotState::Mapped => SlotTurn::Write(idx),
            SlotState::InFlight => {
                self.skipped_frames += 1;
                SlotTurn::Busy
            }
            SlotState::Failed => {
                self.skipped_frames += 1;
                SlotTurn::Remap(idx)
            }
        }
    }

    /// Slot was unmapped for submit, or a remap was requested.
    pub fn mark_in_flight(&self, idx: usize) {
        self.states[idx].store(SlotState::InFlight as u8, Ordering::Release);
    }

    /// Shared state cell for a map callback.
    pub fn handle(&self, idx: usize) -> Arc<AtomicU8> {
        self.states[idx].clone()
    }

    /// Map callback outcome.
    pub fn finish_remap(state: &AtomicU8, ok: bool) {
        let next = if ok { SlotState::Mapped } else { SlotState::Failed };
        state.store(next as u8, Ordering::Release);
    }

    pub fn advance(&mut self) {
        self.rotation.advance();
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    pub fn frames_submitted(&self) -> u64 {
        self.rotation.frame()
    }
}

/// Rotating MAP_WRITE buffers that feed the persistent vertex buffer.
///
/// A slot is written only while mapped. After its copy is submitted it is
/// remapped asynchronously and comes back around `slots` frames later.
/// A frame whose slot is still in flight is skipped, never written.
pub struct StagingRing {
    buffers: Vec<wgpu::Buffer>,
    table: SlotTable,
}

impl StagingRing {
    pub fn new(device: &wgpu::Device, slots: usize, max_vertices: usize) -> Self {
        let size = (max_vertices.max(1) * std::mem::size_of::<ChartVertex>()) as wgpu::BufferAddress;
        let buffers = (0..slots)
            .map(|i| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("staging_slot_{i}")),
                    size,
                    usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                    mapped_at_creation: true,
                })
            })
            .collect::<Vec<_>>();

        Self {
            buffers,
            table: SlotTable::new(slots),
        }
    }

    fn request_remap(&self, idx: usize) {
        self.table.mark_in_flight(idx);
        let state = self.table.handle(idx);
        self.buffers[idx]
            .slice(..)
            .map_async(wgpu::MapMode::Write, move |res| {
                if let Err(e) = &res {
                    log::warn!("Staging remap failed: {e}");
                }
                SlotTable::finish_remap(&state, res.is_ok());
            });
    }

    /// Slot for this frame if it is writable.
    ///
    /// Polls the device once without blocking so finished remaps can land.
    /// `None` means the caller should skip the frame and try again on the
    /// next redraw.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Option<usize> {
        if self.table.current_state() != SlotState::Mapped {
            if let Err(e) = device.poll(wgpu::PollType::Poll) {
                log::warn!("Device poll failed: {e}");
            }
        }
        match self.table.acquire() {
            SlotTurn::Write(idx) => Some(idx),
            SlotTurn::Busy => None,
            SlotTurn::Remap(idx) => {
                self.request_remap(idx);
                None
            }
        }
    }

    /// Copy `vertices` into slot `idx`, unmap it and record the device copy
    /// into `dst`. Must be followed by a submit and then [`Self::recycle`].
    pub fn upload(
        &mut self,
        idx: usize,
        encoder: &mut wgpu::CommandEncoder,
        vertices: &[ChartVertex],
        dst: &wgpu::Buffer,
    ) {
        debug_assert_eq!(self.table.state(idx), SlotState::Mapped);
        let buffer = &self.buffers[idx];
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let len = bytes.len() as wgpu::BufferAddress;
        if len > 0 {
            let mut view = buffer.slice(..len).get_mapped_range_mut();
            view.copy_from_slice(bytes);
        }
        buffer.unmap();
        self.table.mark_in_flight(idx);
        if len > 0 {
            encoder.copy_buffer_to_buffer(buffer, 0, dst, 0, len);
        }
    }

    /// After submit: start the async remap and move to the next slot.
    pub fn recycle(&mut self, idx: usize) {
        self.request_remap(idx);
        self.table.advance();
    }

    pub fn skipped_frames(&self) -> u64 {
        self.table.skipped_frames()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.table.frames_submitted()
    }
}

impl Drop for StagingRing {
    fn drop(&mut self) {
        // Release regardless of mapped / in-flight state.
        for buffer in &self.buffers {
            buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycles_through_slots() {
        let mut r = SlotRotation::new(3);
        let seen: Vec<usize> = (0..7)
            .map(|_| {
                let i = r.current();
                r.advance();
                i
            })
            .collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(r.frame(), 7);
    }

    #[test]
    fn slot_reused_only_after_others() {
        // Between two uses of a slot, every other slot gets exactly one turn.
        let slots = 4;
        let mut r = SlotRotation::new(slots);
        let order: Vec<usize> = (0..slots * 3)
            .map(|_| {
                let i = r.current();
                r.advance();
                i
            })
            .collect();
        for w in order.windows(slots + 1) {
            assert_eq!(w[0], w[slots]);
            let mut between = w[1..slots].to_vec();
            between.sort_unstable();
            between.dedup();
            assert_eq!(between.len(), slots - 1);
        }
    }

    #[test]
    #[should_panic]
    fn single_slot_is_rejected() {
        SlotRotation::new(1);
    }

    #[test]
    fn state_round_trips_through_atomic() {
        for s in [SlotState::Mapped, SlotState::InFlight, SlotState::Failed] {
            assert_eq!(SlotState::from_u8(s as u8), s);
        }
    }

    /// One frame against the table, the way `StagingRing` drives it.
    fn frame(table: &mut SlotTable) -> SlotTurn {
        let turn = table.acquire();
        match turn {
            SlotTurn::Write(idx) => {
                table.mark_in_flight(idx);
                table.advance();
            }
            SlotTurn::Remap(idx) => table.mark_in_flight(idx),
            SlotTurn::Busy => {}
        }
        turn
    }

    #[test]
    fn in_flight_slot_is_skipped_and_counted() {
        let mut table = SlotTable::new(2);
        assert_eq!(frame(&mut table), SlotTurn::Write(0));
        assert_eq!(frame(&mut table), SlotTurn::Write(1));

        // slot 0 has not come back yet
        assert_eq!(frame(&mut table), SlotTurn::Busy);
        assert_eq!(frame(&mut table), SlotTurn::Busy);
        assert_eq!(table.skipped_frames(), 2);
        assert_eq!(table.frames_submitted(), 2);

        SlotTable::finish_remap(&table.handle(0), true);
        assert_eq!(frame(&mut table), SlotTurn::Write(0));
    }

    #[test]
    fn failed_remap_is_requested_again() {
        let mut table = SlotTable::new(2);
        frame(&mut table);
        frame(&mut table);
        SlotTable::finish_remap(&table.handle(0), false);

        assert_eq!(frame(&mut table), SlotTurn::Remap(0));
        assert_eq!(table.state(0), SlotState::InFlight);
        assert_eq!(table.skipped_frames(), 1);

        // still pending until the retried map lands
        assert_eq!(frame(&mut table), SlotTurn::Busy);
        SlotTable::finish_remap(&table.handle(0), true);
        assert_eq!(frame(&mut table), SlotTurn::Write(0));
    }

    #[test]
    fn never_hands_out_an_unmapped_slot() {
        let mut rng = fastrand::Rng::with_seed(9);
        let slots = 3;
        let mut table = SlotTable::new(slots);
        let mut skipped = 0;
        for _ in 0..2_000 {
            // random map completions between frames
            for idx in 0..slots {
                if table.state(idx) == SlotState::InFlight && rng.u8(..4) == 0 {
                    SlotTable::finish_remap(&table.handle(idx), rng.u8(..8) != 0);
                }
            }
            let before = table.current_state();
            match frame(&mut table) {
                SlotTurn::Write(_) => assert_eq!(before, SlotState::Mapped),
                SlotTurn::Busy => {
                    assert_eq!(before, SlotState::InFlight);
                    skipped += 1;
                }
                SlotTurn::Remap(_) => {
                    assert_eq!(before, SlotState::Failed);
                    skipped += 1;
                }
            }
        }
        assert_eq!(table.skipped_frames(), skipped);
        assert!(table.frames_submitted() > 0);
    }
}
