/// Fixed palette for top-level nodes.
pub const PALETTE: [&str; 10] = [
    "#ef4444", "#f59e0b", "#10b981", "#3b82f6", "#8b5cf6", "#ec4899", "#14b8a6", "#f97316",
    "#6366f1", "#84cc16",
];

/// Palette color for a root, a pure function of its name and sibling index.
pub fn root_color(name: &str, sibling_index: usize) -> &'static str {
    let mut hash: u32 = 0;
    for c in name.chars() {
        hash = hash.wrapping_mul(31).wrapping_add(c as u32);
    }
    let slot = (hash as usize).wrapping_add(sibling_index) % PALETTE.len();
    PALETTE[slot]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_color() {
        for _ in 0..5 {
            assert_eq!(root_color("Fitness", 0), root_color("Fitness", 0));
        }
        assert!(PALETTE.contains(&root_color("Fitness", 0)));
    }

    #[test]
    fn index_shifts_palette_slot() {
        let a = root_color("Reading", 1);
        let b = root_color("Reading", 2);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_name_uses_index_only() {
        assert_eq!(root_color("", 0), PALETTE[0]);
        assert_eq!(root_color("", 3), PALETTE[3]);
    }
}
