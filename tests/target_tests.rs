//! Render Target Manager Tests
//!
//! Tests for the pure decision logic of the target pool:
//! - Ping-pong buffer alternation
//! - Read-index tracking across swaps

use ember::target::PingPong;

// ============================================================================
// Ping-pong semantics
// ============================================================================

#[test]
fn swap_returns_distinct_write_and_read_buffers() {
    let mut chain = PingPong::default();
    let (write, read) = chain.swap();
    assert_ne!(write, read);
}

#[test]
fn second_swap_reads_what_the_first_wrote() {
    let mut chain = PingPong::default();

    let (first_write, _) = chain.swap();
    let (second_write, second_read) = chain.swap();

    // The buffer that was the destination of the first swap must be the
    // source of the second.
    assert_eq!(second_read, first_write);
    assert_ne!(second_write, second_read);
}

#[test]
fn buffer_identity_alternates_every_swap() {
    let mut chain = PingPong::default();
    let mut writes = Vec::new();
    for _ in 0..6 {
        let (write, _) = chain.swap();
        writes.push(write);
    }
    assert_eq!(writes, vec![1, 0, 1, 0, 1, 0]);
}

#[test]
fn read_index_tracks_the_most_recent_write() {
    let mut chain = PingPong::default();
    assert_eq!(chain.read_index(), 0);

    let (write, _) = chain.swap();
    assert_eq!(chain.read_index(), write);

    let (write, _) = chain.swap();
    assert_eq!(chain.read_index(), write);
}
