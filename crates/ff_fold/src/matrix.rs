//! Upper-triangular packed storage for the `n*(n+1)/2` distinct `(i,j)`,
//! `i <= j` DP cells, avoiding the wasted half of a dense `n*n` matrix.

#[derive(Debug, Clone)]
pub struct TriMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Copy> TriMatrix<T> {
    pub fn new(n: usize, fill: T) -> Self {
        let size = n * (n + 1) / 2;
        TriMatrix { n, data: vec![fill; size] }
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i <= j && j < self.n, "index ({i},{j}) out of triangular bounds for n={}", self.n);
        // Rows before `i` have lengths n, n-1, .., n-i+1; their total size is
        // i*n - i*(i-1)/2. Row `i` itself then starts at column `i`.
        i * self.n - i * (i.saturating_sub(1)) / 2 + (j - i)
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[self.idx(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let idx = self.idx(i, j);
        self.data[idx] = value;
    }

    pub fn n(&self) -> usize {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_cell_addressable_without_overlap() {
        let n = 6;
        let mut m = TriMatrix::new(n, 0i32);
        let mut counter = 0;
        for i in 0..n {
            for j in i..n {
                m.set(i, j, counter);
                counter += 1;
            }
        }
        counter = 0;
        for i in 0..n {
            for j in i..n {
                assert_eq!(m.get(i, j), counter);
                counter += 1;
            }
        }
    }
}
