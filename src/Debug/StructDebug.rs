use crate::Core::{AdmissionGate, SharedCounter};
use crate::Transport::Buffer::RingBuffer;
use crate::Transport::{Consumer, Producer, TransportRegion};
use std::fmt;

/// Debug function for SharedCounter
///
/// Shows the name, the role and the current (relaxed) value.
pub fn debug_shared_counter(counter: &SharedCounter, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SharedCounter")
        .field("name", &counter.name)
        .field("owner", &counter.owner)
        .field("value", &counter.load())
        .finish()
}

/// Debug function for AdmissionGate
pub fn debug_admission_gate(gate: &AdmissionGate, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("AdmissionGate");
    s.field("name", &gate.name)
        .field("owner", &gate.owner)
        .field("capacity", &gate.capacity);
    if !gate.closed {
        s.field("available", &gate.available().ok());
    }
    s.finish()
}

/// Debug function for RingBuffer
///
/// Reads the cursors but never the slot contents
pub fn debug_ring_buffer(buffer: &RingBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RingBuffer")
        .field("buffer", &format_args!("0x{:x}", buffer.buffer_base as usize))
        .field("capacity", &buffer.capacity)
        .field("message_size", &buffer.message_size)
        .field("pending", &buffer.len())
        .field("closed", &buffer.is_closed())
        .finish()
}

/// Debug function for TransportRegion
pub fn debug_transport_region(region: &TransportRegion, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TransportRegion")
        .field("name", &region.name)
        .field("shm", &"<opaque>")
        .field("ring", &region.ring)
        .finish()
}

impl fmt::Debug for SharedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_shared_counter(self, f)
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_admission_gate(self, f)
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_ring_buffer(self, f)
    }
}

impl fmt::Debug for TransportRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_transport_region(self, f)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("region", &self.region).finish()
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("region", &*self.region)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
