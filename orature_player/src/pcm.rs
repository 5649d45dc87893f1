// decode little-endian PCM into 16-bit samples, keeping the most significant bits

pub fn decode_pcm(data: &[u8], bits_per_sample: u16) -> Vec<i16> {
    match bits_per_sample {
        8 => data.iter().map(|&x| ((x as i16) - 128) << 8).collect(),
        16 => data.chunks_exact(2).map(|x| i16::from_le_bytes([x[0], x[1]])).collect(),
        24 => data.chunks_exact(3).map(|x| i16::from_le_bytes([x[1], x[2]])).collect(),
        32 => data.chunks_exact(4).map(|x| i16::from_le_bytes([x[2], x[3]])).collect(),
        _ => Vec::new(),
    }
}
