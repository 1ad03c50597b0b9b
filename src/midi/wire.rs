//! Raw packet decoding for input ports
//!
//! Ports normally deliver one message per packet, but some hosts concatenate
//! simultaneous note messages into one longer packet. Those are split back
//! into 3-byte messages here.

use super::events::MidiEvent;

/// Decode one packet into events. Undecodable messages are logged and skipped.
pub fn decode_packet(bytes: &[u8]) -> Vec<MidiEvent> {
    let mut events = Vec::new();
    let mut rest = bytes;

    while !rest.is_empty() {
        let status = rest[0];
        let take = if rest.len() > 3 && (0x80..=0x9F).contains(&status) {
            3
        } else {
            rest.len()
        };

        let (message, tail) = rest.split_at(take);
        match MidiEvent::from_bytes(message) {
            Ok(event) => events.push(event),
            Err(e) => log::warn!("Invalid MIDI message {:02X?}: {}", message, e),
        }
        rest = tail;
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_message() {
        assert_eq!(decode_packet(&[0x90, 60, 100]), vec![MidiEvent::note_on(0, 60, 100)]);
        assert_eq!(decode_packet(&[0xC1, 5]), vec![MidiEvent::program_change(1, 5)]);
    }

    #[test]
    fn test_concatenated_notes_are_split() {
        let packet = [0x90, 60, 100, 0x90, 64, 100, 0x81, 67, 0];
        assert_eq!(
            decode_packet(&packet),
            vec![
                MidiEvent::note_on(0, 60, 100),
                MidiEvent::note_on(0, 64, 100),
                MidiEvent::note_off(1, 67),
            ]
        );
    }

    #[test]
    fn test_sysex_stays_whole() {
        let packet = [0xF0, 0x7D, 0x01, 0x02, 0xF7];
        assert_eq!(decode_packet(&packet), vec![MidiEvent::System(packet.to_vec())]);
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(decode_packet(&[]).is_empty());
        assert!(decode_packet(&[0x40, 0x40]).is_empty());
    }
}
