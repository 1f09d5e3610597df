//! LZ4 block decompression for compressed `Glat` tables.

use crate::error::ParseError;

const MIN_MATCH: usize = 4;

/// Decompress an LZ4 block that is expected to expand to exactly `size` bytes.
pub fn decompress(input: &[u8], size: usize) -> Result<Vec<u8>, ParseError> {
    let mut output = Vec::with_capacity(size);
    let mut pos = 0;

    loop {
        let token = *input.get(pos).ok_or(ParseError::CompressionError)?;
        pos += 1;

        let literal_len = read_length(input, &mut pos, usize::from(token >> 4))?;
        let literals = input
            .get(pos..pos + literal_len)
            .ok_or(ParseError::CompressionError)?;
        if output.len() + literal_len > size {
            return Err(ParseError::CompressionError);
        }
        output.extend_from_slice(literals);
        pos += literal_len;

        // the last sequence consists of literals only
        if pos == input.len() {
            break;
        }

        let offset = match input.get(pos..pos + 2) {
            Some(&[lo, hi]) => usize::from(u16::from_le_bytes([lo, hi])),
            _ => return Err(ParseError::CompressionError),
        };
        pos += 2;
        if offset == 0 || offset > output.len() {
            return Err(ParseError::CompressionError);
        }

        let match_len = read_length(input, &mut pos, usize::from(token & 0xF))? + MIN_MATCH;
        if output.len() + match_len > size {
            return Err(ParseError::CompressionError);
        }
        // the source may overlap the bytes being written, so copy one byte at a time
        let start = output.len() - offset;
        for i in 0..match_len {
            let byte = output[start + i];
            output.push(byte);
        }
    }

    if output.len() != size {
        return Err(ParseError::CompressionError);
    }
    Ok(output)
}

fn read_length(input: &[u8], pos: &mut usize, nibble: usize) -> Result<usize, ParseError> {
    let mut length = nibble;
    if nibble == 0xF {
        loop {
            let byte = *input.get(*pos).ok_or(ParseError::CompressionError)?;
            *pos += 1;
            length = length
                .checked_add(usize::from(byte))
                .ok_or(ParseError::CompressionError)?;
            if byte != 0xFF {
                break;
            }
        }
    }
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_only() {
        let block = [0x50, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(decompress(&block, 5).unwrap(), b"hello");
    }

    #[test]
    fn overlapping_match() {
        // "ab" then a match of 6 at offset 2, then a literal "c"
        let block = [0x22, b'a', b'b', 0x02, 0x00, 0x10, b'c'];
        assert_eq!(decompress(&block, 9).unwrap(), b"ababababc");
    }

    #[test]
    fn long_literal_run() {
        let mut block = vec![0xF0, 5];
        block.extend(std::iter::repeat(7).take(20));
        assert_eq!(decompress(&block, 20).unwrap(), vec![7; 20]);
    }

    #[test]
    fn bad_offset() {
        let block = [0x10, b'a', 0x05, 0x00, 0x00];
        assert_eq!(decompress(&block, 10), Err(ParseError::CompressionError));
    }

    #[test]
    fn size_mismatch() {
        let block = [0x30, 1, 2, 3];
        assert_eq!(decompress(&block, 4), Err(ParseError::CompressionError));
    }
}
