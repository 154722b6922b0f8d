use super::*;

#[tokio::test]
async fn splits_on_newlines() {
    let mut reader = LineReader::new(std::io::Cursor::new(b"one\ntwo\nthree\n".to_vec()));
    assert_eq!(reader.next_line().await, Some("one".to_string()));
    assert_eq!(reader.next_line().await, Some("two".to_string()));
    assert_eq!(reader.next_line().await, Some("three".to_string()));
    assert_eq!(reader.next_line().await, None);
}

#[tokio::test]
async fn emits_trailing_fragment_without_newline() {
    let mut reader = LineReader::new(std::io::Cursor::new(b"full\npartial".to_vec()));
    assert_eq!(reader.next_line().await, Some("full".to_string()));
    assert_eq!(reader.next_line().await, Some("partial".to_string()));
    assert_eq!(reader.next_line().await, None);
}

#[tokio::test]
async fn strips_trailing_carriage_return() {
    let mut reader = LineReader::new(std::io::Cursor::new(b"windows\r\nline\r\n".to_vec()));
    assert_eq!(reader.next_line().await, Some("windows".to_string()));
    assert_eq!(reader.next_line().await, Some("line".to_string()));
}

#[tokio::test]
async fn replaces_invalid_utf8_with_replacement_char() {
    let mut data = b"bad:".to_vec();
    data.push(0xff);
    data.push(b'\n');
    let mut reader = LineReader::new(std::io::Cursor::new(data));
    let line = reader.next_line().await.unwrap();
    assert!(line.starts_with("bad:"));
    assert!(line.contains('\u{FFFD}'));
}

#[tokio::test]
async fn splits_overlong_line_at_cap() {
    let mut data = vec![b'a'; MAX_LINE_BYTES + 10];
    data.push(b'\n');
    let mut reader = LineReader::new(std::io::Cursor::new(data));
    let first = reader.next_line().await.unwrap();
    assert_eq!(first.len(), MAX_LINE_BYTES);
    let second = reader.next_line().await.unwrap();
    assert_eq!(second.len(), 10);
    assert_eq!(reader.next_line().await, None);
}
