use std::fmt::{self, Display, Formatter};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::*;
use num_traits::Float;

use crate::estimate::FillProfile;

impl<F> FillProfile<F>
where
    F: Float + Display,
{
    /// Render the profile as a `max_dim × max_dim` grid, row block size
    /// down, column block size across.
    pub fn display(&self) -> String {
        let b = self.max_dim();

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic);

        let mut header = vec![Cell::new("r \\ c").set_alignment(CellAlignment::Center)];
        header.extend((1..=b).map(|c| Cell::new(c).set_alignment(CellAlignment::Center)));
        table.set_header(header);

        for r in 1..=b {
            let mut row = vec![Cell::new(r).set_alignment(CellAlignment::Center)];
            row.extend((1..=b).map(|c| {
                Cell::new(format!("{:.3}", self.get(r, c))).set_alignment(CellAlignment::Right)
            }));
            table.add_row(row);
        }

        table.to_string()
    }
}

impl<F> Display for FillProfile<F>
where
    F: Float + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}
