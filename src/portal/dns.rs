//! Wildcard DNS answers for the setup access point.
//!
//! Every A query resolves to the portal address so that a phone's
//! connectivity check lands on the setup page. Other query types get an
//! empty NOERROR reply.

/// Port the responder listens on.
pub const DNS_PORT: u16 = 53;

const HEADER_LEN: usize = 12;
const TYPE_A: u16 = 1;
const TYPE_ANY: u16 = 255;
const CLASS_IN: u16 = 1;
const ANSWER_TTL_SECS: u32 = 60;
/// Name pointer, type, class, TTL, length, IPv4 address.
const ANSWER_LEN: usize = 2 + 2 + 2 + 4 + 2 + 4;

const FLAG_RESPONSE: u16 = 0x8000;
const FLAG_AUTHORITATIVE: u16 = 0x0400;
const FLAG_RECURSION_DESIRED: u16 = 0x0100;
const FLAG_RECURSION_AVAILABLE: u16 = 0x0080;

/// Write the reply to `query` into `out`, answering with `address`.
///
/// Returns the reply length, or `None` for anything that is not a standard
/// query with one readable question (those are dropped silently).
pub fn captive_reply(query: &[u8], address: [u8; 4], out: &mut [u8]) -> Option<usize> {
    if query.len() < HEADER_LEN {
        return None;
    }
    let flags = u16::from_be_bytes([query[2], query[3]]);
    let questions = u16::from_be_bytes([query[4], query[5]]);
    let opcode = (flags >> 11) & 0x0F;
    if flags & FLAG_RESPONSE != 0 || opcode != 0 || questions == 0 {
        return None;
    }

    let end = question_end(query)?;
    let question = &query[HEADER_LEN..end];
    let qtype = u16::from_be_bytes([query[end - 4], query[end - 3]]);
    let answered = qtype == TYPE_A || qtype == TYPE_ANY;

    let len = HEADER_LEN + question.len() + if answered { ANSWER_LEN } else { 0 };
    if out.len() < len {
        return None;
    }

    let reply_flags = FLAG_RESPONSE
        | FLAG_AUTHORITATIVE
        | (flags & FLAG_RECURSION_DESIRED)
        | FLAG_RECURSION_AVAILABLE;
    out[0..2].copy_from_slice(&query[0..2]);
    out[2..4].copy_from_slice(&reply_flags.to_be_bytes());
    out[4..6].copy_from_slice(&1u16.to_be_bytes());
    out[6..8].copy_from_slice(&u16::from(answered).to_be_bytes());
    out[8..12].fill(0);
    out[HEADER_LEN..HEADER_LEN + question.len()].copy_from_slice(question);

    if answered {
        let answer = &mut out[HEADER_LEN + question.len()..len];
        // Pointer to the question name at offset 12.
        answer[0..2].copy_from_slice(&[0xC0, 0x0C]);
        answer[2..4].copy_from_slice(&TYPE_A.to_be_bytes());
        answer[4..6].copy_from_slice(&CLASS_IN.to_be_bytes());
        answer[6..10].copy_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
        answer[10..12].copy_from_slice(&4u16.to_be_bytes());
        answer[12..16].copy_from_slice(&address);
    }
    Some(len)
}

/// Offset just past the first question's QTYPE/QCLASS.
fn question_end(query: &[u8]) -> Option<usize> {
    let mut i = HEADER_LEN;
    loop {
        let label = usize::from(*query.get(i)?);
        i += 1;
        if label == 0 {
            break;
        }
        // Compressed names never appear in a query's question.
        if label & 0xC0 != 0 {
            return None;
        }
        i += label;
    }
    let end = i + 4;
    (end <= query.len()).then_some(end)
}
