/// STL file parser for binary and ASCII formats
use nom::{
    bytes::complete::{tag_no_case, take},
    character::complete::{multispace0, multispace1, not_line_ending},
    combinator::cut,
    multi::{count, many0, many1},
    number::complete::{float, le_f32, le_u16, le_u32},
    sequence::{preceded, tuple},
    IResult,
};

use crate::error::StlError;
use crate::geometry::{Mesh, Triangle, Vertex};

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, StlError> {
    if data.len() < HEADER_LEN + 4 {
        return Err(StlError::TooSmall(data.len()));
    }

    let (body, declared) = binary_header(data).map_err(|_| StlError::TooSmall(data.len()))?;
    let declared = declared as usize;
    let available = body.len() / FACET_LEN;
    if available < declared {
        return Err(StlError::Truncated { declared, available });
    }

    let (_, triangles) = count(binary_facet, declared)(body)
        .map_err(|_| StlError::Truncated { declared, available })?;

    let mut mesh = Mesh::with_capacity(declared);
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }
    Ok(mesh)
}

fn binary_header(input: &[u8]) -> IResult<&[u8], u32> {
    preceded(take(HEADER_LEN), le_u32)(input)
}

fn binary_vector3(input: &[u8]) -> IResult<&[u8], (f32, f32, f32)> {
    tuple((le_f32, le_f32, le_f32))(input)
}

fn binary_facet(input: &[u8]) -> IResult<&[u8], Triangle> {
    let (input, normal) = binary_vector3(input)?;
    let (input, positions) = count(binary_vector3, 3)(input)?;
    // Attribute byte count, unused
    let (input, _) = le_u16(input)?;

    let vertex = |(x, y, z): (f32, f32, f32)| Vertex::new(x, y, z, normal.0, normal.1, normal.2);
    let triangle = Triangle::new(vertex(positions[0]), vertex(positions[1]), vertex(positions[2]));
    Ok((input, with_face_normal(triangle)))
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, StlError> {
    match ascii_solids(input) {
        Ok((_, solids)) => {
            let mut mesh = Mesh::with_capacity(solids.iter().map(Vec::len).sum());
            for triangle in solids.into_iter().flatten() {
                mesh.add_triangle(triangle);
            }
            Ok(mesh)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(StlError::Ascii {
            line: line_of(input, e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(StlError::Ascii {
            line: input.lines().count().max(1),
        }),
    }
}

/// 1-based line number of `rest` inside `input`
fn line_of(input: &str, rest: &str) -> usize {
    let consumed = input.len() - rest.len();
    input[..consumed].matches('\n').count() + 1
}

fn ascii_solids(input: &str) -> IResult<&str, Vec<Vec<Triangle>>> {
    many1(ascii_solid)(input)
}

fn ascii_solid(input: &str) -> IResult<&str, Vec<Triangle>> {
    let (input, _) = preceded(multispace0, tag_no_case("solid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag_no_case("endsolid"))(input)?;
    let (input, _name) = not_line_ending(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, triangles))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag_no_case("facet"))(input)?;
    // Past the keyword a mismatch is an error at its own position, not the end of the solid
    cut(facet_body)(input)
}

fn facet_body(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace1, tag_no_case("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag_no_case("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag_no_case("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag_no_case("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag_no_case("endfacet"))(input)?;

    Ok((input, with_face_normal(Triangle::new(v1, v2, v3))))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag_no_case("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Replace a missing (zero-length) stored normal with the winding normal
fn with_face_normal(mut triangle: Triangle) -> Triangle {
    if triangle.vertices[0].normal.norm_squared() > f32::EPSILON {
        return triangle;
    }
    let normal = triangle.calculate_normal();
    for vertex in &mut triangle.vertices {
        vertex.normal = normal;
    }
    triangle
}

/// Whether `data` should be decoded as binary STL
///
/// A length that matches the declared triangle count is decisive. Otherwise
/// the keyword `solid` near the start marks ASCII; binary exporters are free
/// to write "solid" into the header, which is why the size check comes first.
pub fn is_binary(data: &[u8]) -> bool {
    if data.len() >= HEADER_LEN + 4 {
        let declared = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
        let expected = declared
            .checked_mul(FACET_LEN)
            .and_then(|n| n.checked_add(HEADER_LEN + 4));
        if expected == Some(data.len()) {
            return true;
        }
    }

    let head = &data[..data.len().min(10)];
    !head.windows(5).any(|w| w.eq_ignore_ascii_case(b"solid"))
}

/// Encode a mesh as binary STL with an empty header
pub fn write_binary_stl(mesh: &Mesh) -> Vec<u8> {
    let mut data = Vec::with_capacity(HEADER_LEN + 4 + mesh.triangles.len() * FACET_LEN);
    data.resize(HEADER_LEN, 0);
    data.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
    for triangle in &mesh.triangles {
        let normal = triangle.vertices[0].normal;
        let positions = triangle.vertices.iter().map(|v| v.position.coords);
        for vector in std::iter::once(normal).chain(positions) {
            for value in vector.iter() {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        data.extend_from_slice(&0u16.to_le_bytes());
    }
    data
}

/// Detect and parse STL file (binary or ASCII)
pub fn parse_stl(data: &[u8]) -> Result<Mesh, StlError> {
    if is_binary(data) {
        return parse_binary_stl(data);
    }
    let text = std::str::from_utf8(data).map_err(|_| StlError::Encoding)?;
    parse_ascii_stl(text)
}
