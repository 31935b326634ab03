use crate::types::NodeId;

/// [Szudzik pairing function][szudzik-pairing].
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        // b * b + a
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        // a * a + a + b
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

/// Cheap structural hash used by the operation caches.
///
/// Cache keys are small tuples of dense integer ids, so a pairing function
/// beats a byte-oriented hasher.
pub trait IdHash {
    fn id_hash(&self) -> u64;
}

impl IdHash for u64 {
    fn id_hash(&self) -> u64 {
        *self
    }
}

impl IdHash for NodeId {
    fn id_hash(&self) -> u64 {
        self.index() as u64
    }
}

impl IdHash for (u64, u64) {
    fn id_hash(&self) -> u64 {
        pairing2(self.0, self.1)
    }
}

impl IdHash for (u64, u64, u64) {
    fn id_hash(&self) -> u64 {
        pairing3(self.0, self.1, self.2)
    }
}

impl IdHash for (NodeId, NodeId) {
    fn id_hash(&self) -> u64 {
        pairing2(self.0.index() as u64, self.1.index() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_szudzik() {
        // a\b  0  1  2  3  4
        // ------------------
        // 0    0  1  4  9 16
        // 1    2  3  5 10 17
        // 2    6  7  8 11 18
        // 3   12 13 14 15 19
        // 4   20 21 22 23 24
        assert_eq!(pairing2(0, 0), 0);
        assert_eq!(pairing2(0, 1), 1);
        assert_eq!(pairing2(1, 0), 2);
        assert_eq!(pairing2(1, 1), 3);
        assert_eq!(pairing2(0, 2), 4);
        assert_eq!(pairing2(1, 2), 5);
        assert_eq!(pairing2(2, 0), 6);
        assert_eq!(pairing2(2, 2), 8);
        assert_eq!(pairing2(4, 0), 20);
        assert_eq!(pairing2(4, 4), 24);
    }

    #[test]
    fn test_pairing3_distinct() {
        let h1 = pairing3(1, 2, 3);
        let h2 = pairing3(3, 2, 1);
        let h3 = pairing3(1, 3, 2);
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
        assert_ne!(h2, h3);
    }
}
