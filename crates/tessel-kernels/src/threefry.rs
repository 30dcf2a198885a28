//! Threefry-2x32 counter-based random bits.

const ROTATIONS: [[u32; 4]; 2] = [[13, 15, 26, 6], [17, 29, 16, 24]];
const PARITY: u32 = 0x1BD1_1BDA;

/// Threefry-2x32 with 20 rounds: hash `count` under `key`.
pub fn threefry2x32(key: (u32, u32), count: (u32, u32)) -> (u32, u32) {
    let ks = [key.0, key.1, key.0 ^ key.1 ^ PARITY];
    let (mut x0, mut x1) = (count.0.wrapping_add(ks[0]), count.1.wrapping_add(ks[1]));
    for i in 0..5 {
        for &r in &ROTATIONS[i % 2] {
            x0 = x0.wrapping_add(x1);
            x1 = x1.rotate_left(r);
            x1 ^= x0;
        }
        x0 = x0.wrapping_add(ks[(i + 1) % 3]);
        x1 = x1.wrapping_add(ks[(i + 2) % 3]).wrapping_add(i as u32 + 1);
    }
    (x0, x1)
}

/// Fill `out` with the random bytes generated for one key.
///
/// The bytes are split into 32-bit words; word pairs `(j, j + half)` come
/// from one hash of the counter pair, and an odd middle word takes the first
/// half of the hash at counter `(half, 0)`.
pub fn random_bits(key: (u32, u32), out: &mut [u8]) {
    let nwords = out.len().div_ceil(4);
    let half = nwords / 2;
    let odd = nwords % 2 == 1;
    let mut words = vec![0u32; nwords];

    let second = half + odd as usize;
    for j in 0..half {
        let (lo, hi) = threefry2x32(key, (j as u32, (second + j) as u32));
        words[j] = lo;
        words[second + j] = hi;
    }
    if odd {
        words[half] = threefry2x32(key, (half as u32, 0)).0;
    }

    for (chunk, word) in out.chunks_mut(4).zip(&words) {
        chunk.copy_from_slice(&word.to_ne_bytes()[..chunk.len()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_and_keyed() {
        let a = threefry2x32((0, 1), (0, 0));
        assert_eq!(a, threefry2x32((0, 1), (0, 0)));
        assert_ne!(a, threefry2x32((0, 2), (0, 0)));
        assert_ne!(a, threefry2x32((0, 1), (1, 0)));
    }

    #[test]
    fn test_random_bits_layout() {
        let key = (7, 42);
        let mut out = [0u8; 16];
        random_bits(key, &mut out);
        let (w0, w2) = threefry2x32(key, (0, 2));
        let (w1, w3) = threefry2x32(key, (1, 3));
        let expected: Vec<u8> = [w0, w1, w2, w3].iter().flat_map(|w| w.to_ne_bytes()).collect();
        assert_eq!(out.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_random_bits_odd_and_partial() {
        let key = (3, 9);
        let mut out = [0u8; 10]; // 3 words, last one partial
        random_bits(key, &mut out);
        let (w0, w2) = threefry2x32(key, (0, 2));
        let w1 = threefry2x32(key, (1, 0)).0;
        assert_eq!(&out[0..4], &w0.to_ne_bytes());
        assert_eq!(&out[4..8], &w1.to_ne_bytes());
        assert_eq!(&out[8..10], &w2.to_ne_bytes()[..2]);
    }
}
