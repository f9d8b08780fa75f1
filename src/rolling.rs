//! A windowed Adler-32 variant rolling hash.
//!
//! Maintains a fixed-width window and supports O(1) advancement by one byte.
//! This is the hash the slicer (`crate::slicer`) samples to decide chunk
//! boundaries; its exact bit pattern is part of the content-addressing
//! contract, so the update formula below is frozen.

use std::collections::VecDeque;

const MODULUS: u32 = 65521;

pub struct RollingHash {
    window: VecDeque<u8>,
    window_size: usize,
    s1: u32,
    s2: u32,
}

impl RollingHash {
    pub fn new(window_size: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            s1: 0,
            s2: 0,
        }
    }

    /// Seed the hash with the initial window contents. `bytes.len()` must be
    /// `<= window_size`; callers top the window up before the first `roll`.
    pub fn write(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.window_size);
        let n = bytes.len() as u32;
        let mut s1: u32 = 0;
        let mut s2: u32 = 0;
        for (i, &b) in bytes.iter().enumerate() {
            let weight = n - i as u32;
            s1 = (s1 + b as u32) % MODULUS;
            s2 = (s2 + weight * b as u32) % MODULUS;
        }
        self.s1 = s1;
        self.s2 = s2;
        self.window.extend(bytes.iter().copied());
    }

    /// Slide the window forward by one byte, evicting the oldest and
    /// bringing `incoming` in at the front of the weighting scheme.
    pub fn roll(&mut self, incoming: u8) {
        let outgoing = self.window.pop_front().expect("roll on empty window");
        self.window.push_back(incoming);

        let s1_new = (self.s1 + MODULUS - (outgoing as u32 % MODULUS) + incoming as u32) % MODULUS;
        let w = self.window_size as u32;
        let s2_new = (self.s2 + MODULUS - (w * outgoing as u32 % MODULUS) % MODULUS + s1_new) % MODULUS;
        self.s1 = s1_new;
        self.s2 = s2_new;
    }

    pub fn sum(&self) -> u32 {
        (self.s2 << 16) | self.s1
    }
}
