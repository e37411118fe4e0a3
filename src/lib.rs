//! Grid Traffic Library
//!
//! A discrete-time cellular automaton of road traffic: vehicles move cell by
//! cell along lines and through crossroads, wired into networks of one, four
//! or sixteen signal-controlled intersections.

pub mod simulation;
