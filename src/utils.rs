use chrono::{DateTime, Local};

pub fn current_timestamp() -> DateTime<Local> {
    Local::now()
}

/// 把一个块格式化成十六进制 + ASCII 的转储行，每行 16 字节
pub fn hex_dump(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(row, chunk)| {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!("{:04x}  {:<47}  |{}|", row * 16, hex.join(" "), ascii)
        })
        .collect()
}

/// 把字节数转成人类可读的字符串
pub fn human_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    }
}
