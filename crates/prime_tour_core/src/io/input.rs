use std::{
    fs,
    io::Read,
    path::Path,
};

use crate::{Cities, City, Error, Result};

/// Reads a `id,x,y` city file with a header line. `None` reads stdin.
///
/// Rows are taken in file order; the id column is ignored.
pub fn read_cities(path: Option<&Path>) -> Result<Cities> {
    let text = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            Error::invalid_input(format!("failed to read cities from {}: {e}", path.display()))
        })?,
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    let cities = parse_cities(&text)?;
    log::info!("input: cities={}", cities.len());
    Ok(cities)
}

pub fn parse_cities(text: &str) -> Result<Cities> {
    let mut cities = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        cities.push(parse_row(line, line_no)?);
    }

    if cities.is_empty() {
        return Err(Error::invalid_data("No cities found after the header line."));
    }

    Ok(cities.into_iter().collect())
}

fn parse_row(line: &str, line_no: usize) -> Result<City> {
    let mut fields = line.split(',').map(str::trim);
    let (Some(_id), Some(x_s), Some(y_s)) = (fields.next(), fields.next(), fields.next()) else {
        return Err(Error::invalid_data(format!(
            "Line {line_no}: expected 'id,x,y' but got: {line}"
        )));
    };

    let x: f64 = x_s
        .parse()
        .map_err(|_| Error::invalid_data(format!("Line {line_no}: invalid x: {x_s}")))?;
    let y: f64 = y_s
        .parse()
        .map_err(|_| Error::invalid_data(format!("Line {line_no}: invalid y: {y_s}")))?;

    let city = City::new(x, y);
    if !city.is_finite() {
        return Err(Error::invalid_data(format!(
            "Line {line_no}: coordinates must be finite: {line}"
        )));
    }
    Ok(city)
}
