#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_rayon::init_thread_pool;

/// Starts the rayon worker pool backing the parallel parts of the library.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn init_threads(n: usize) -> js_sys::Promise {
    init_thread_pool(n)
}

/// Concatenates variable length lists into one flat array plus `len + 1`
/// offsets, so list `i` is `flat[offsets[i]..offsets[i + 1]]`.
pub fn flatten_with_offsets<T: Copy, U: Copy>(lists: &[Vec<T>], convert: impl Fn(T) -> U) -> (Vec<U>, Vec<u32>) {
    let mut flat = Vec::with_capacity(lists.iter().map(Vec::len).sum());
    let mut offsets = Vec::with_capacity(lists.len() + 1);
    offsets.push(0);
    for list in lists {
        flat.extend(list.iter().map(|&x| convert(x)));
        offsets.push(flat.len() as u32);
    }
    (flat, offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_with_offsets() {
        let lists: Vec<Vec<usize>> = vec![vec![0, 1], vec![], vec![2, 3, 4]];
        let (flat, offsets) = flatten_with_offsets(&lists, |x| x as u32);
        assert_eq!(flat, vec![0, 1, 2, 3, 4]);
        assert_eq!(offsets, vec![0, 2, 2, 5]);
    }
}
