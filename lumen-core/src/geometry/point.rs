use std::fmt::{Display, Error, Formatter};
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub};

use num::{Num, Zero};

use crate::geometry::{Vector2, Vector3};

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Point2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point2<T>
where
    T: Num + Copy,
{
    pub fn new(x: T, y: T) -> Point2<T> {
        Point2 { x, y }
    }
}

impl Point2<f32> {
    pub fn floor(&self) -> Point2<f32> {
        Point2::new(self.x.floor(), self.y.floor())
    }

    pub fn ceil(&self) -> Point2<f32> {
        Point2::new(self.x.ceil(), self.y.ceil())
    }
}

impl<T> Add<Vector2<T>> for Point2<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point2<T>;

    fn add(self, rhs: Vector2<T>) -> Point2<T> {
        Point2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl<T> Add<Point2<T>> for Point2<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point2<T>;

    fn add(self, rhs: Point2<T>) -> Point2<T> {
        Point2 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl<T> Sub<Point2<T>> for Point2<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Vector2<T>;

    fn sub(self, rhs: Point2<T>) -> Vector2<T> {
        Vector2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl<T> Sub<Vector2<T>> for Point2<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Point2<T>;

    fn sub(self, rhs: Vector2<T>) -> Point2<T> {
        Point2 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl<T> Mul<T> for Point2<T>
where
    T: Mul<Output = T> + Copy,
{
    type Output = Point2<T>;

    fn mul(self, v: T) -> Point2<T> {
        Point2 {
            x: self.x * v,
            y: self.y * v,
        }
    }
}

impl Mul<Point2<f32>> for f32 {
    type Output = Point2<f32>;

    fn mul(self, p: Point2<f32>) -> Point2<f32> {
        Point2 {
            x: self * p.x,
            y: self * p.y,
        }
    }
}

impl<T> Index<usize> for Point2<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        match i {
            0 => &self.x,
            1 => &self.y,
            _ => panic!("Invalid index into point"),
        }
    }
}

impl<T> Zero for Point2<T>
where
    T: Num + Copy,
{
    fn zero() -> Point2<T> {
        Point2::new(T::zero(), T::zero())
    }

    fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }
}

impl From<Point2<i32>> for Point2<f32> {
    fn from(p: Point2<i32>) -> Point2<f32> {
        Point2::new(p.x as f32, p.y as f32)
    }
}

impl<T> Display for Point2<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Point3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

impl<T> Point3<T>
where
    T: Num + Copy,
{
    pub fn new(x: T, y: T, z: T) -> Point3<T> {
        Point3 { x, y, z }
    }
}

impl Point3<f32> {
    pub fn has_nan(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.z.is_nan()
    }

    pub fn abs(&self) -> Vector3<f32> {
        Vector3::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn floor(&self) -> Point3<f32> {
        Point3::new(self.x.floor(), self.y.floor(), self.z.floor())
    }
}

impl<T> Add<Vector3<T>> for Point3<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn add(self, rhs: Vector3<T>) -> Point3<T> {
        Point3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl<T> AddAssign<Vector3<T>> for Point3<T>
where
    T: AddAssign + Copy,
{
    fn add_assign(&mut self, rhs: Vector3<T>) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl<T> Add<Point3<T>> for Point3<T>
where
    T: Add<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn add(self, rhs: Point3<T>) -> Point3<T> {
        Point3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl<T> Sub<Point3<T>> for Point3<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Vector3<T>;

    fn sub(self, rhs: Point3<T>) -> Vector3<T> {
        Vector3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl<T> Sub<Vector3<T>> for Point3<T>
where
    T: Sub<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn sub(self, rhs: Vector3<T>) -> Point3<T> {
        Point3 {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl<T> Mul<T> for Point3<T>
where
    T: Mul<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn mul(self, v: T) -> Point3<T> {
        Point3 {
            x: self.x * v,
            y: self.y * v,
            z: self.z * v,
        }
    }
}

impl<T> Div<T> for Point3<T>
where
    T: Div<Output = T> + Copy,
{
    type Output = Point3<T>;

    fn div(self, v: T) -> Point3<T> {
        Point3 {
            x: self.x / v,
            y: self.y / v,
            z: self.z / v,
        }
    }
}

impl<T> Index<usize> for Point3<T> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Invalid index into point"),
        }
    }
}

impl<T> IndexMut<usize> for Point3<T> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        match i {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("Invalid index into point"),
        }
    }
}

impl<T> Zero for Point3<T>
where
    T: Num + Copy,
{
    fn zero() -> Point3<T> {
        Point3::new(T::zero(), T::zero(), T::zero())
    }

    fn is_zero(&self) -> bool {
        self.x.is_zero() && self.y.is_zero() && self.z.is_zero()
    }
}

impl<T> From<Vector3<T>> for Point3<T>
where
    T: Num + Copy,
{
    fn from(v: Vector3<T>) -> Point3<T> {
        Point3::new(v.x, v.y, v.z)
    }
}

impl<T> From<Point3<T>> for Vector3<T>
where
    T: Num + Copy,
{
    fn from(p: Point3<T>) -> Vector3<T> {
        Vector3::new(p.x, p.y, p.z)
    }
}

impl<T> Display for Point3<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}
