use crate::triangulation::Triangulation;
use image::{Rgb, Rgba, RgbaImage};

/// Paints every pixel with the color of its triangle. Pixels outside the mesh stay transparent.
pub fn paint(width: u32, height: u32, triangulation: &Triangulation, colors: &[Rgb<u8>]) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        match triangulation.locate(x, y).and_then(|t| colors.get(t)) {
            Some(Rgb([r, g, b])) => Rgba([*r, *g, *b, 255]),
            None => Rgba([0, 0, 0, 0]),
        }
    })
}

#[cfg(feature = "svg")]
mod vector {
    use crate::triangulation::Triangulation;
    use anyhow::Result;
    use image::Rgb;
    use std::path;
    use svg::node::element::Polygon;
    use svg::Document;

    fn hex(color: &Rgb<u8>) -> String {
        format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
    }

    fn draw_triangles(
        document: Document,
        triangulation: &Triangulation,
        colors: &[Rgb<u8>],
    ) -> Document {
        let mut document = document;

        for (index, color) in colors.iter().enumerate().take(triangulation.len()) {
            let points = triangulation
                .vertices(index)
                .iter()
                .map(|p| format!("{},{}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(" ");

            // Stroke with the fill color to hide seams between neighbors.
            document = document.add(
                Polygon::new()
                    .set("points", points)
                    .set("fill", hex(color))
                    .set("stroke", hex(color))
                    .set("stroke-width", "1.0"),
            );
        }

        document
    }

    pub fn write_svg(
        filename: &path::Path,
        triangulation: &Triangulation,
        colors: &[Rgb<u8>],
        width: u32,
        height: u32,
    ) -> Result<()> {
        let document = Document::new().set("viewBox", (0, 0, width, height));
        let document = draw_triangles(document, triangulation, colors);

        svg::save(filename, &document)?;

        Ok(())
    }

}

#[cfg(feature = "svg")]
pub use vector::write_svg;
