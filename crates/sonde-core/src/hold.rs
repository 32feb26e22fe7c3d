//! Ordered queue of held windows over pooled buffers.
//!
//! Each held window owns one reference to a [`PoolBuffer`] plus a read
//! position and a remaining-frame count. A producer appends chunks of any
//! size; a consumer walks the queue from the oldest window and consumes
//! frames with [`HoldQueue::advance`], which never copies sample data.
//!
//! Windows live in an arena and are linked by index, so removal from any
//! position is O(1). Handles are generation-checked: using a [`HeldId`] after
//! its window was removed, or with a different queue, panics.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{PoolBuffer, Result};

static NEXT_QUEUE_ID: AtomicU32 = AtomicU32::new(0);

/// Handle to a window in a [`HoldQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeldId {
    queue: u32,
    index: u32,
    generation: u32,
}

/// Read position of a held window. Comparable, but deliberately not
/// convertible to a raw offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    offset: usize,
}

struct Held {
    buffer: PoolBuffer,
    offset: usize,
    count: usize,
}

struct Node {
    held: Option<Held>,
    generation: u32,
    prev: Option<u32>,
    // Doubles as the free-list link while the node is vacant.
    next: Option<u32>,
}

pub struct HoldQueue {
    id: u32,
    nodes: Vec<Node>,
    free_head: Option<u32>,
    oldest: Option<u32>,
    newest: Option<u32>,
    len: usize,
    total_frames: usize,
}

impl Default for HoldQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldQueue {
    pub fn new() -> Self {
        Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
            free_head: None,
            oldest: None,
            newest: None,
            len: 0,
            total_frames: 0,
        }
    }

    /// Append `frames` frames of `buffer` as the newest window. The queue
    /// takes its own reference to the buffer.
    ///
    /// # Panics
    ///
    /// If `frames` exceeds the buffer's capacity.
    pub fn add(&mut self, buffer: &PoolBuffer, frames: usize) -> Result<HeldId> {
        assert!(
            frames <= buffer.capacity(),
            "held window of {frames} frames exceeds buffer capacity {}",
            buffer.capacity()
        );

        let index = match self.free_head {
            Some(index) => {
                self.free_head = self.nodes[index as usize].next;
                index
            }
            None => {
                self.nodes.try_reserve(1)?;
                let index = u32::try_from(self.nodes.len())
                    .expect("hold queue arena exceeds u32::MAX slots");
                self.nodes.push(Node {
                    held: None,
                    generation: 0,
                    prev: None,
                    next: None,
                });
                index
            }
        };

        let node = &mut self.nodes[index as usize];
        node.held = Some(Held {
            buffer: buffer.add_ref(),
            offset: 0,
            count: frames,
        });
        node.prev = self.newest;
        node.next = None;
        let generation = node.generation;

        match self.newest {
            Some(newest) => self.nodes[newest as usize].next = Some(index),
            None => self.oldest = Some(index),
        }
        self.newest = Some(index);
        self.len += 1;
        self.total_frames += frames;

        Ok(HeldId {
            queue: self.id,
            index,
            generation,
        })
    }

    pub fn newest(&self) -> Option<HeldId> {
        self.newest.map(|index| self.id_at(index))
    }

    pub fn oldest(&self) -> Option<HeldId> {
        self.oldest.map(|index| self.id_at(index))
    }

    /// The next newer window, if any.
    pub fn next(&self, id: HeldId) -> Option<HeldId> {
        self.node(id).next.map(|index| self.id_at(index))
    }

    /// The next older window, if any.
    pub fn prev(&self, id: HeldId) -> Option<HeldId> {
        self.node(id).prev.map(|index| self.id_at(index))
    }

    pub fn cursor(&self, id: HeldId) -> Cursor {
        Cursor {
            offset: self.held(id).offset,
        }
    }

    /// Remaining frames in the window.
    pub fn count(&self, id: HeldId) -> usize {
        self.held(id).count
    }

    /// The window's remaining frames, starting at its cursor.
    pub fn data(&self, id: HeldId) -> &[f32] {
        let held = self.held(id);
        &held.buffer.as_slice()[held.offset..held.offset + held.count]
    }

    pub fn buffer(&self, id: HeldId) -> &PoolBuffer {
        &self.held(id).buffer
    }

    /// Consume `n` frames from the front of the window and return what is
    /// left. When that reaches zero the window is removed and its buffer
    /// reference released.
    ///
    /// # Panics
    ///
    /// If `n` exceeds the remaining count.
    pub fn advance(&mut self, id: HeldId, n: usize) -> usize {
        let index = self.check(id);
        let held = self.nodes[index as usize]
            .held
            .as_mut()
            .expect("checked handle refers to a live window");
        assert!(
            n <= held.count,
            "advance by {n} frames exceeds the {} remaining in the window",
            held.count
        );

        if n < held.count {
            held.offset += n;
            held.count -= n;
            self.total_frames -= n;
            held.count
        } else {
            self.unlink(index);
            0
        }
    }

    /// Remove a window from any position. Returns `true` if this dropped the
    /// last reference to its buffer.
    pub fn release(&mut self, id: HeldId) -> bool {
        let index = self.check(id);
        self.unlink(index).buffer.release()
    }

    pub fn release_all(&mut self) {
        while let Some(index) = self.oldest {
            self.unlink(index);
        }
    }

    /// Tear the queue down.
    ///
    /// # Panics
    ///
    /// If any window is still held. Drain with [`release_all`](Self::release_all)
    /// or [`advance`](Self::advance) first.
    pub fn exit(self) {
        assert!(
            self.is_empty(),
            "hold queue destroyed with {} held windows",
            self.len
        );
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of the remaining counts of every window.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Windows from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = HeldId> + '_ {
        let mut cursor = self.oldest;
        std::iter::from_fn(move || {
            let index = cursor?;
            cursor = self.nodes[index as usize].next;
            Some(self.id_at(index))
        })
    }

    /// Copy frames from the oldest windows into `out` without consuming
    /// them. Returns the number of frames copied.
    pub fn read_into(&self, out: &mut [f32]) -> usize {
        let mut written = 0;
        for id in self.iter() {
            if written == out.len() {
                break;
            }
            let data = self.data(id);
            let n = data.len().min(out.len() - written);
            out[written..written + n].copy_from_slice(&data[..n]);
            written += n;
        }
        written
    }

    /// Copy the newest `out.len()` frames (or fewer, if fewer are held)
    /// into `out`, oldest first. Returns the number copied.
    pub fn read_tail_into(&self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.total_frames);
        let mut skip = self.total_frames - n;
        let mut written = 0;
        for id in self.iter() {
            let data = self.data(id);
            if skip >= data.len() {
                skip -= data.len();
                continue;
            }
            let data = &data[skip..];
            skip = 0;
            out[written..written + data.len()].copy_from_slice(data);
            written += data.len();
        }
        written
    }

    /// Consume up to `n` frames from the oldest windows onward. Returns the
    /// number actually consumed.
    pub fn consume(&mut self, n: usize) -> usize {
        let mut consumed = 0;
        while consumed < n {
            let Some(oldest) = self.oldest() else {
                break;
            };
            let take = self.count(oldest).min(n - consumed);
            self.advance(oldest, take);
            consumed += take;
        }
        consumed
    }

    /// Drop the oldest frames until at most `keep` remain.
    pub fn retain_newest(&mut self, keep: usize) {
        let excess = self.total_frames.saturating_sub(keep);
        self.consume(excess);
    }

    fn id_at(&self, index: u32) -> HeldId {
        HeldId {
            queue: self.id,
            index,
            generation: self.nodes[index as usize].generation,
        }
    }

    fn check(&self, id: HeldId) -> u32 {
        let live = id.queue == self.id
            && self
                .nodes
                .get(id.index as usize)
                .is_some_and(|node| node.generation == id.generation && node.held.is_some());
        assert!(live, "stale or foreign held window handle {id:?}");
        id.index
    }

    fn node(&self, id: HeldId) -> &Node {
        let index = self.check(id);
        &self.nodes[index as usize]
    }

    fn held(&self, id: HeldId) -> &Held {
        self.node(id)
            .held
            .as_ref()
            .expect("checked handle refers to a live window")
    }

    fn unlink(&mut self, index: u32) -> Held {
        let node = &mut self.nodes[index as usize];
        let held = node
            .held
            .take()
            .expect("unlinking a vacant hold queue slot");
        let (prev, next) = (node.prev.take(), node.next.take());
        node.generation = node.generation.wrapping_add(1);
        node.next = self.free_head;
        self.free_head = Some(index);

        match prev {
            Some(prev) => self.nodes[prev as usize].next = next,
            None => self.oldest = next,
        }
        match next {
            Some(next) => self.nodes[next as usize].prev = prev,
            None => self.newest = prev,
        }

        self.len -= 1;
        self.total_frames -= held.count;
        held
    }
}

impl Drop for HoldQueue {
    fn drop(&mut self) {
        if !self.is_empty() {
            tracing::warn!(held = self.len, "hold queue dropped without exit, releasing windows");
            self.release_all();
        }
    }
}

impl std::fmt::Debug for HoldQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HoldQueue")
            .field("len", &self.len)
            .field("total_frames", &self.total_frames)
            .finish()
    }
}
