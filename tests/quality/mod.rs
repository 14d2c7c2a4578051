mod aliasing;
mod files;
mod processors;
