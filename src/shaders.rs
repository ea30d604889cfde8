// GLSL ES 3.00 sources and the names the host binds against.

// === UNIFORMS ===
pub const U_PROJECTION: &str = "projection";
pub const U_VIEW: &str = "view";
pub const U_FOCAL: &str = "focal";
pub const U_VIEWPORT: &str = "viewport";
pub const U_TIME: &str = "uTime";
pub const U_TEXTURE: &str = "u_texture";
pub const U_USE_DEPTH_FADE: &str = "u_useDepthFade";
pub const U_DEPTH_FADE: &str = "u_depthFade";
pub const U_MOUSE: &str = "mouse";
pub const U_CAMERA_POSITION: &str = "cameraPosition";
pub const U_CLICKED: &str = "clicked";
pub const U_RAY_DIRECTION: &str = "rayDirection";

// === ATTRIBUTES ===
pub const ATTR_POSITION: &str = "position";
pub const ATTR_INDEX: &str = "index";
pub const ATTR_PARTICLE_SOURCE: &str = "aParticleSourcePosition";
pub const ATTR_PARTICLE: &str = "aParticlePosition";

pub const FEEDBACK_VARYINGS: [&str; 1] = ["oParticlePosition"];

// Instanced splat billboard. Reads the center and covariance of splat `index`
// from the RGBA32UI texture, projects the 3D covariance through the view
// Jacobian and stretches the quad along the 2D eigenvectors.
pub const SPLAT_VERTEX: &str = r#"#version 300 es
precision highp float;
precision highp int;

uniform float uTime;

uniform highp usampler2D u_texture;
uniform mat4 projection, view;
uniform vec2 focal;
uniform vec2 viewport;

uniform bool u_useDepthFade;
uniform float u_depthFade;

uniform vec2 mouse;
uniform vec3 cameraPosition;
uniform bool clicked;
uniform vec3 rayDirection;

in vec2 position;
in int index;

out vec4 vColor;
out vec2 vPosition;
out float vTime;
out vec3 worldPosition;

float cubicPulse(float c, float w, float x) {
    x = abs(x - c);
    if (x > w) return 0.0;
    x /= w;
    return 1.0 - x * x * (3.0 - 2.0 * x);
}

bool intersect(vec3 rayPos, vec3 rayDir, vec3 spherePos, float sphereRadius) {
    vec3 oc = spherePos - rayPos;
    float t = dot(oc, rayDir);
    if (t < 0.0) return false;
    float r2 = sphereRadius * sphereRadius;
    float h2 = dot(oc, oc) - t * t;
    return h2 <= r2;
}

void main () {
    vTime = uTime;

    uvec4 cen = texelFetch(u_texture, ivec2((uint(index) & 0x3ffu) << 1, uint(index) >> 10), 0);
    worldPosition = vec3(uintBitsToFloat(cen.xyz));

    float pulse = sin(vTime) * 2.6 + 0.6;
    float zone = cubicPulse(pulse, 0.3, worldPosition.y);
    if (zone > 0.01) {
        worldPosition.x += zone * 0.2 * sign(worldPosition.x);
        worldPosition.y += zone * 0.2 * sign(worldPosition.y);
    }

    float radiusOrigin = 1.0;
    float dist = length(worldPosition);
    if (intersect(cameraPosition, rayDirection, worldPosition, 0.7)) {
        vec3 v = cameraPosition * 0.5;
        worldPosition -= (radiusOrigin - dist) * v;
        worldPosition += (radiusOrigin - dist) * v * (sin(0.5 * vTime) + 1.0) / 2.0;
    }

    vec4 cam = view * vec4(worldPosition, 1);
    vec4 pos2d = projection * cam;

    float clip = 1.2 * pos2d.w;
    if (pos2d.z < -pos2d.w || pos2d.x < -clip || pos2d.x > clip || pos2d.y < -clip || pos2d.y > clip) {
        gl_Position = vec4(0.0, 0.0, 2.0, 1.0);
        return;
    }

    uvec4 cov = texelFetch(u_texture, ivec2(((uint(index) & 0x3ffu) << 1) | 1u, uint(index) >> 10), 0);
    vec2 u1 = unpackHalf2x16(cov.x), u2 = unpackHalf2x16(cov.y), u3 = unpackHalf2x16(cov.z);
    mat3 Vrk = mat3(u1.x, u1.y, u2.x, u1.y, u2.y, u3.x, u2.x, u3.x, u3.y);

    mat3 J = mat3(
        focal.x / cam.z, 0., -(focal.x * cam.x) / (cam.z * cam.z),
        0., -focal.y / cam.z, (focal.y * cam.y) / (cam.z * cam.z),
        0., 0., 0.
    );

    mat3 T = transpose(mat3(view)) * J;
    mat3 cov2d = transpose(T) * Vrk * T;

    float mid = (cov2d[0][0] + cov2d[1][1]) / 2.0;
    float radius = length(vec2((cov2d[0][0] - cov2d[1][1]) / 2.0, cov2d[0][1]));
    float lambda1 = mid + radius, lambda2 = mid - radius;

    if (lambda2 < 0.0) return;
    vec2 diagonalVector = normalize(vec2(cov2d[0][1], lambda1 - cov2d[0][0]));
    vec2 majorAxis = min(sqrt(2.0 * lambda1), 1024.0) * diagonalVector;
    vec2 minorAxis = min(sqrt(2.0 * lambda2), 1024.0) * vec2(diagonalVector.y, -diagonalVector.x);

    vColor = vec4((cov.w) & 0xffu, (cov.w >> 8) & 0xffu, (cov.w >> 16) & 0xffu, (cov.w >> 24) & 0xffu) / 255.0;
    vPosition = position;

    float scalingFactor = 1.0;
    if (u_useDepthFade) {
        float depthNorm = (pos2d.z / pos2d.w + 1.0) / 2.0;
        float near = 0.1; float far = 100.0;
        float normalizedDepth = (2.0 * near) / (far + near - depthNorm * (far - near));
        float start = max(normalizedDepth - 0.1, 0.0);
        float end = min(normalizedDepth + 0.1, 1.0);
        scalingFactor = clamp((u_depthFade - start) / (end - start), 0.0, 1.0);
    }

    vec2 center = vec2(pos2d) / pos2d.w;
    gl_Position = vec4(
        center
        + position.x * majorAxis * scalingFactor / viewport
        + position.y * minorAxis * scalingFactor / viewport, 0.0, 1.0);
}
"#;

// Gaussian falloff; splats crossing the pulse band are tinted green.
pub const SPLAT_FRAGMENT: &str = r#"#version 300 es
precision highp float;

in vec4 vColor;
in vec2 vPosition;
in float vTime;
in vec3 worldPosition;

out vec4 fragColor;

float cubicPulse(float c, float w, float x) {
    x = abs(x - c);
    if (x > w) return 0.0;
    x /= w;
    return 1.0 - x * x * (3.0 - 2.0 * x);
}

void main () {
    float A = -dot(vPosition, vPosition);
    if (A < -4.0) discard;
    float B = exp(A) * vColor.a;
    vec4 originalColor = vec4(vColor.rgb * B, B);

    float pulse = sin(vTime) * 2.6 + 0.6;
    float band = cubicPulse(pulse, 0.3, worldPosition.y);

    vec4 alternateColor = vec4(vec3(0.0, 1.0, 0.0) * B, B);
    fragColor = mix(originalColor, alternateColor, band);
}
"#;

// Transform-feedback program: one point per particle, rasterizer discarded.
pub const PARTICLE_VERTEX: &str = r#"#version 300 es
precision highp float;

in vec3 aParticleSourcePosition;
in vec3 aParticlePosition;

out vec3 oParticlePosition;

void main () {
    oParticlePosition = aParticlePosition + aParticleSourcePosition;
}
"#;

pub const PARTICLE_FRAGMENT: &str = r#"#version 300 es
precision highp float;

out vec4 fragColor;

void main () {
    fragColor = vec4(0.0);
}
"#;
