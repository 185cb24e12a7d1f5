//! Action types for state machine I/O requests.

/// Action requested by a state machine.
///
/// The caller should perform the requested I/O and then call the state
/// machine's `step()` method again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Read one packet from the server.
    ///
    /// The caller should:
    /// 1. Read frames until one shorter than the maximum frame length arrives
    /// 2. Check each frame's sequence id
    /// 3. Store the reassembled payload in `buffer_set.read_buffer`
    /// 4. Call `step()` again
    ReadPacket,

    /// Write `buffer_set.write_buffer` to the server as one packet.
    ///
    /// The caller should frame the payload, write all bytes and flush,
    /// then call `step()` again.
    Write,

    /// Write `buffer_set.write_buffer` as one packet, then read a packet.
    ///
    /// Used for commands and authentication exchanges.
    WriteAndReadPacket,

    /// Write `buffer_set.write_buffer` (the SSLRequest), then perform the TLS handshake.
    ///
    /// After a successful handshake, call `step()` again.
    UpgradeTls,

    /// The state machine has finished successfully.
    Finished,
}
